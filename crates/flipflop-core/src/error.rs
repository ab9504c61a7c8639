//! Error types for the cat-mod flip-flop core
//!
//! 形状・設定の不整合と、単独で構築した系列の遷移不変条件違反を表す。
//! バッチドライバに渡された系列の違反は呼び出し側のバグとして panic で扱う。

use crate::flipflop::TransitionViolation;

/// 形状・設定エラー
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FlipFlopError {
    /// `nstate - nmod = 2·nbase² + 2·nbase` を満たす整数 nbase が存在しない
    #[error("state count {nstate} with {nmod} modification categories has no integral base count")]
    NonIntegralBaseCount { nstate: usize, nmod: usize },

    /// 修飾カテゴリ数が状態数を超えている
    #[error("modification category count {nmod} exceeds state count {nstate}")]
    TooManyModCategories { nstate: usize, nmod: usize },

    /// オフセット表が空
    #[error("canonical mod offset table is empty")]
    EmptyModOffsets,

    /// オフセット表の長さが nbase + 1 でない
    #[error("canonical mod offset table length mismatch: expected {expected}, got {actual}")]
    ModOffsetsLength { expected: usize, actual: usize },

    /// オフセット表が非減少でない、または先頭が 0 でない
    #[error("canonical mod offsets must start at 0 and be non-decreasing (position {0})")]
    ModOffsetsNotMonotone(usize),

    /// カテゴリ重みの長さが修飾カテゴリ数と一致しない
    #[error("modification category weight count mismatch: expected {expected}, got {actual}")]
    ModWeightsLength { expected: usize, actual: usize },

    /// sharpness が正の有限値でない
    #[error("sharpness must be positive and finite, got {0}")]
    InvalidSharpness(f32),

    /// ロジットテンソルの長さが nblk·nbatch·nstate と一致しない
    #[error("logit length mismatch: expected {expected}, got {actual}")]
    LogitLength { expected: usize, actual: usize },

    /// 系列長テーブルの要素数がバッチサイズと一致しない
    #[error("sequence length table has {actual} entries for a batch of {expected}")]
    BatchLength { expected: usize, actual: usize },

    /// 系列長の合計が連結系列の長さと一致しない
    #[error("concatenated sequence length mismatch: lengths sum to {expected}, got {actual}")]
    SequenceLength { expected: usize, actual: usize },

    /// 修飾カテゴリ系列の長さが遷移状態系列と一致しない
    #[error("modification category length mismatch: expected {expected}, got {actual}")]
    ModCategoryLength { expected: usize, actual: usize },

    /// 遷移状態列が flip-flop の不変条件を満たさない
    #[error("invalid flip-flop sequence: {0}")]
    InvalidTransition(#[from] TransitionViolation),

    /// 出力バッファの長さが不正
    #[error("output length mismatch: expected {expected}, got {actual}")]
    OutputLength { expected: usize, actual: usize },
}

/// Result type for flip-flop operations
pub type FlipFlopResult<T> = Result<T, FlipFlopError>;
