//! 後ろ向き再帰
//!
//! 前向き再帰の時間反転。最終行は最終位置のみ 0（全ブロックを消費して系列末尾で終わる）。
//! ブロック `nblk - 1` から 0 へ向かって、行 `r` を行 `r + 1` とブロック `r` のスコアから計算する。
//! 返すスコアは行 0・位置 0 で、前向きの総スコアと一致する。

use crate::context::CatModContext;
use crate::lse::log_sum_exp;
use crate::sequence::Sequence;
use crate::table::LatticeTable;
use crate::tensor::ElementLogits;

/// 後ろ向き 1 ステップ（行 `next` → 行 `curr`）
#[inline]
pub fn backward_step(
    ctx: &CatModContext<'_>,
    block: &[f32],
    seq: &Sequence<'_>,
    next: &[f32],
    curr: &mut [f32],
) {
    let sharp = ctx.sharpness();

    // 留まる
    for (pos, (c, &n)) in curr.iter_mut().zip(next).enumerate() {
        *c = ctx.remain_score(block, seq, pos) + n;
    }

    // 進む（位置 p の値を p - 1 へ戻す）
    for pos in 1..seq.len() {
        let step = ctx.step(block, seq, pos);
        curr[pos - 1] = log_sum_exp(curr[pos - 1], next[pos] + step.can + step.modif, sharp);
    }
}

/// 後ろ向きテーブルを計算し、テーブルと総スコアを返す
///
/// 系列長 0 の要素は呼び出し側（バッチドライバ）で除外すること。
pub fn backward(ctx: &CatModContext<'_>, logits: &ElementLogits<'_>, seq: &Sequence<'_>) -> (LatticeTable, f32) {
    assert!(!seq.is_empty(), "backward recursion requires a non-empty sequence");
    let nblk = logits.nblk();
    let mut bwd = LatticeTable::new(nblk, seq.len());
    bwd.row_mut(nblk)[seq.len() - 1] = 0.0;

    for blk in (0..nblk).rev() {
        let (next, curr) = bwd.rows_backward(blk);
        backward_step(ctx, logits.block(blk), seq, next, curr);
    }

    let score = bwd.get(0, 0);
    (bwd, score)
}
