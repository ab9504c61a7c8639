//! 安定化 log-sum-exp
//!
//! `sharp = 1` で通常の `ln(e^x + e^y)`、`sharp` を大きくすると `max(x, y)` に近づく。

/// 2 項の安定化 log-sum-exp
///
/// ```text
/// combine(x, y, s) = max(x, y) + ln(1 + exp(-s·|x - y|)) / s
///                  = ln(exp(s·x) + exp(s·y)) / s
/// ```
///
/// `exp` の引数は常に 0 以下なのでオーバーフローしない（アンダーフローで 0 になるのは正しい挙動）。
/// NaN は握り潰さずそのまま伝播させる。
#[inline]
pub fn log_sum_exp(x: f32, y: f32, sharp: f32) -> f32 {
    x.max(y) + (-sharp * (x - y).abs()).exp().ln_1p() / sharp
}
