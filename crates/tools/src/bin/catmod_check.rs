//! catmod_check - フィクスチャに対する cat-mod flip-flop の整合性チェック
//!
//! 前向き・後ろ向きスコア、要素間の勾配差、中心差分との誤差を表示する。
//! フィクスチャを省略すると組み込みの参照用フィクスチャを使う。
//!
//! # 使用例
//!
//! ```bash
//! # 参照用フィクスチャ
//! cargo run --release -p tools --bin catmod_check
//!
//! # 全スロットの微分表と JSON レポート
//! cargo run --release -p tools --bin catmod_check -- \
//!   --fixture batch.toml --derivatives --json report.json
//!
//! # sharpness を変えて確認
//! cargo run --release -p tools --bin catmod_check -- --sharpness 4
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use log::info;

use tools::common::io::open_writer;
use tools::fixture::Fixture;
use tools::gradcheck::{self, CheckReport, DEFAULT_DELTA};

#[derive(Parser, Debug)]
#[command(name = "catmod_check", version, about = "cat-mod flip-flop の前向き・後ろ向き・勾配を検証する")]
struct Cli {
    /// フィクスチャ（TOML、"-" で標準入力）。省略時は組み込みの参照用フィクスチャ
    #[arg(short, long)]
    fixture: Option<PathBuf>,

    /// sharpness を上書きする
    #[arg(long)]
    sharpness: Option<f32>,

    /// 中心差分の刻み幅
    #[arg(long, default_value_t = DEFAULT_DELTA)]
    delta: f32,

    /// 中心差分を計算しない
    #[arg(long, default_value_t = false)]
    skip_fd: bool,

    /// 全スロットの微分表を表示する
    #[arg(long, default_value_t = false)]
    derivatives: bool,

    /// JSON レポートの出力先（"-" で標準出力）
    #[arg(long)]
    json: Option<PathBuf>,

    /// スレッド数（0 = 論理コア数）
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// デバッグログを有効にする
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn print_report(report: &CheckReport) {
    let join = |v: &[f32]| v.iter().map(|s| format!("{s:.6}")).collect::<Vec<_>>().join(" ");
    println!("Forward scores: {}", join(&report.scores_fwd));
    println!("Backward scores: {}", join(&report.scores_bwd));
    println!("Max score delta = {:.6}", report.max_score_delta);
    if let (Some(all), Some(canonical)) = (report.max_grad_delta, report.max_canonical_grad_delta) {
        println!("Max grad delta = {all:.6} (canonical {canonical:.6})");
    }
    if let Some(err) = report.max_fd_error {
        println!("Max finite difference error = {err:.6}");
    }

    if let Some(derivs) = &report.derivatives {
        println!("Derivatives:");
        let mut current = None;
        for d in derivs {
            if current != Some((d.blk, d.batch)) {
                current = Some((d.blk, d.batch));
                println!("  Block {} element {}", d.blk, d.batch);
            }
            println!("    {:.6} d={:.6} r={:.6} [{:.6}]", d.analytic, d.diff, d.ratio, d.numeric);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tools::init_logger(if cli.debug { "debug" } else { "info" });

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("failed to configure the thread pool")?;
    }

    let mut fixture = match &cli.fixture {
        Some(path) => Fixture::load(path)?,
        None => Fixture::reference()?,
    };
    if let Some(sharpness) = cli.sharpness {
        fixture.params.sharpness = sharpness;
        fixture.validate()?;
    }
    ensure!(cli.delta > 0.0 && cli.delta.is_finite(), "--delta must be positive, got {}", cli.delta);

    info!(
        "fixture: nblk={} nbatch={} nstate={} sharpness={}",
        fixture.nblk, fixture.nbatch, fixture.nstate, fixture.params.sharpness
    );

    let delta = (!cli.skip_fd).then_some(cli.delta);
    let report = gradcheck::check(&fixture, delta, cli.derivatives)?;
    print_report(&report);

    if let Some(path) = &cli.json {
        let mut w = open_writer(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(&mut w, &report)?;
        w.close()?;
        info!("report written to {}", path.display());
    }
    Ok(())
}
