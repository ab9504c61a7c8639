//! catmod_random_check - ランダムなバッチで cat-mod flip-flop の整合性を確認する
//!
//! シードごとに妥当なバッチ（flip-flop 符号化した系列、ランダムな修飾カテゴリ）を生成し、
//! 前向き・後ろ向きスコアの一致と中心差分との誤差を確認する。
//! 許容誤差を超えたら終了コード 1 で終わる。
//!
//! # 使用例
//!
//! ```bash
//! cargo run --release -p tools --bin catmod_random_check -- \
//!   --iterations 20 --nbase 4 --nblk 24 --nbatch 8 --threads 8
//!
//! # 失敗したバッチを保存して catmod_check で再現
//! cargo run --release -p tools --bin catmod_random_check -- \
//!   --seed 7 --save-failures failures/
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;

use tools::common::io::open_writer;
use tools::fixture::Fixture;
use tools::gradcheck::{self, DEFAULT_DELTA};

#[derive(Parser, Debug)]
#[command(name = "catmod_random_check", version, about = "ランダムなバッチで cat-mod flip-flop を検証する")]
struct Cli {
    /// 最初のシード（以降 +1 ずつ）
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// 試行回数
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// 塩基数
    #[arg(long, default_value_t = 4)]
    nbase: usize,

    /// 塩基あたりの最大修飾カテゴリ数
    #[arg(long, default_value_t = 3)]
    max_categories: u32,

    /// ブロック数
    #[arg(long, default_value_t = 12)]
    nblk: usize,

    /// バッチ要素数
    #[arg(long, default_value_t = 4)]
    nbatch: usize,

    /// 系列長を固定する（省略時は 0..=nblk からランダム）
    #[arg(long)]
    seqlen: Option<usize>,

    /// sharpness
    #[arg(long, default_value_t = 1.0)]
    sharpness: f32,

    /// 中心差分の刻み幅
    #[arg(long, default_value_t = DEFAULT_DELTA)]
    delta: f32,

    /// 中心差分を計算しない
    #[arg(long, default_value_t = false)]
    skip_fd: bool,

    /// 許容誤差（スコア差は相対、中心差分は絶対）
    #[arg(long, default_value_t = 1e-2)]
    tolerance: f32,

    /// 失敗したバッチを TOML で保存するディレクトリ
    #[arg(long)]
    save_failures: Option<PathBuf>,

    /// JSON サマリの出力先（"-" で標準出力）
    #[arg(long)]
    json: Option<PathBuf>,

    /// スレッド数（0 = 論理コア数）
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// デバッグログを有効にする
    #[arg(long, default_value_t = false)]
    debug: bool,
}

/// 1 試行分の結果
#[derive(Debug, Serialize)]
struct Trial {
    seed: u64,
    seqlens: Vec<usize>,
    max_score_delta: f32,
    max_fd_error: Option<f32>,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    iterations: usize,
    failures: usize,
    trials: Vec<Trial>,
}

fn run_trial(cli: &Cli, seed: u64) -> Result<(Trial, Fixture)> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
    let seqlens: Vec<usize> = (0..cli.nbatch)
        .map(|_| cli.seqlen.unwrap_or_else(|| rng.random_range(0..=cli.nblk)))
        .collect();

    let mut fixture = Fixture::random(seed, cli.nbase, cli.max_categories, cli.nblk, &seqlens)?;
    fixture.params.sharpness = cli.sharpness;

    let delta = (!cli.skip_fd).then_some(cli.delta);
    let report = gradcheck::check(&fixture, delta, false)?;

    let scale = report.scores_fwd.iter().fold(1.0f32, |acc, s| acc.max(s.abs()));
    let scores_ok = report.max_score_delta <= cli.tolerance * scale;
    let fd_ok = report.max_fd_error.is_none_or(|err| err <= cli.tolerance);
    debug!("seed {seed}: seqlens {seqlens:?} score delta {} fd error {:?}", report.max_score_delta, report.max_fd_error);

    let trial = Trial {
        seed,
        seqlens,
        max_score_delta: report.max_score_delta,
        max_fd_error: report.max_fd_error,
        passed: scores_ok && fd_ok,
    };
    Ok((trial, fixture))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tools::init_logger(if cli.debug { "debug" } else { "info" });

    ensure!(cli.nblk > 0, "--nblk must be positive");
    ensure!(cli.nbatch > 0, "--nbatch must be positive");
    if let Some(len) = cli.seqlen {
        ensure!(len <= cli.nblk + 1, "--seqlen {len} cannot be reached in {} blocks", cli.nblk);
    }
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("failed to configure the thread pool")?;
    }
    if let Some(dir) = &cli.save_failures {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut trials = Vec::with_capacity(cli.iterations);
    for i in 0..cli.iterations {
        let seed = cli.seed + i as u64;
        let (trial, fixture) = run_trial(&cli, seed)?;
        if trial.passed {
            info!("seed {seed}: ok (score delta {:.2e})", trial.max_score_delta);
        } else {
            warn!(
                "seed {seed}: FAILED score delta {:.2e}, fd error {:?}",
                trial.max_score_delta, trial.max_fd_error
            );
            if let Some(dir) = &cli.save_failures {
                let path = dir.join(format!("catmod_seed{seed}.toml"));
                fixture.save(&path)?;
                info!("saved {}", path.display());
            }
        }
        trials.push(trial);
    }

    let failures = trials.iter().filter(|t| !t.passed).count();
    println!("{} / {} trials passed", cli.iterations - failures, cli.iterations);

    if let Some(path) = &cli.json {
        let summary = Summary { iterations: cli.iterations, failures, trials };
        let mut w = open_writer(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(&mut w, &summary)?;
        w.close()?;
    }

    if failures > 0 {
        bail!("{failures} of {} trials exceeded tolerance {}", cli.iterations, cli.tolerance);
    }
    Ok(())
}
