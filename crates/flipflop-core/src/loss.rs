//! バッチ損失
//!
//! 学習ループで使う損失 `-Σ score / (系列長 > 0 の要素数)`。
//! 勾配側は同じ係数 `-1 / n` を掛ければよい。

/// 平均損失の係数 `-1 / n`（有効な要素が無ければ 0）
pub fn loss_scale(seqlens: &[usize]) -> f32 {
    let n = seqlens.iter().filter(|&&len| len > 0).count();
    if n == 0 { 0.0 } else { -1.0 / n as f32 }
}

/// 平均損失
pub fn mean_loss(scores: &[f32], seqlens: &[usize]) -> f32 {
    debug_assert_eq!(scores.len(), seqlens.len());
    loss_scale(seqlens) * scores.iter().sum::<f32>()
}
