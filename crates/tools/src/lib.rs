//! cat-mod flip-flop 検証ツール
//!
//! フィクスチャの読み書き、ランダムなバッチの生成、前向き・後ろ向き・勾配の
//! 整合性チェックを提供する。バイナリ `catmod_check` / `catmod_random_check` から使う。

pub mod common;
pub mod fixture;
pub mod gradcheck;

/// env_logger を初期化する（`RUST_LOG` 優先、未指定なら `default_level`）
pub fn init_logger(default_level: &str) {
    use std::io::Write;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, default_level),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
    .target(env_logger::Target::Stderr)
    .init();
}
