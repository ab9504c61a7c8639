//! 勾配（事後期待値）
//!
//! 前向き・後ろ向きテーブルから、各ブロック・各スロットの事後重みを求める。
//!
//! # ブロック r の計算
//!
//! ```text
//! fact   = ⊕_p (fwd[r][p] + bwd[r][p])                        // 左から順に log-sum-exp
//! stay   : grad[remain(p)] += exp(s·(fwd[r][p]   + bwd[r+1][p] + remain(p)      − fact))
//! move   : w = exp(s·(fwd[r][p-1] + bwd[r+1][p] + can + scale·mod − fact))
//!          grad[can_slot]  += w
//!          grad[mod_slot]  += w · scale                        // scale = mod_weight · weight[mod_idx]
//! ```
//!
//! `fact` は総スコアを流用せず、ブロックごとに再計算する。

use crate::backward::backward;
use crate::context::CatModContext;
use crate::forward::forward;
use crate::lse::log_sum_exp;
use crate::sequence::Sequence;
use crate::table::LatticeTable;
use crate::tensor::ElementLogits;

/// ブロック r の正規化定数
#[inline]
pub fn normalising_factor(fwd_row: &[f32], bwd_row: &[f32], sharp: f32) -> f32 {
    let mut fact = fwd_row[0] + bwd_row[0];
    for (&f, &b) in fwd_row.iter().zip(bwd_row).skip(1) {
        fact = log_sum_exp(fact, f + b, sharp);
    }
    fact
}

/// 1 ブロック分の勾配（`grad` は長さ nstate、ここで 0 クリアしてから加算する）
pub fn gradient_step(
    ctx: &CatModContext<'_>,
    block: &[f32],
    seq: &Sequence<'_>,
    fwd_curr: &[f32],
    bwd_next: &[f32],
    fact: f32,
    grad: &mut [f32],
) {
    let sharp = ctx.sharpness();
    grad.fill(0.0);

    for pos in 0..seq.len() {
        let slot = ctx.remain_slot(seq, pos);
        grad[slot] += (sharp * (fwd_curr[pos] + bwd_next[pos] + block[slot] - fact)).exp();
    }

    for pos in 1..seq.len() {
        let step = ctx.step(block, seq, pos);
        debug_assert_ne!(step.can_slot, step.mod_slot);
        let w = (sharp * (fwd_curr[pos - 1] + bwd_next[pos] + step.can + step.modif - fact)).exp();
        grad[step.can_slot] += w;
        grad[step.mod_slot] += w * step.mod_scale;
    }
}

/// 1 バッチ要素の勾配を前向き・後ろ向きテーブルから計算する
///
/// `grad` はブロック順に連続した `nblk × nstate`。
pub fn gradient_from_tables(
    ctx: &CatModContext<'_>,
    logits: &ElementLogits<'_>,
    seq: &Sequence<'_>,
    fwd: &LatticeTable,
    bwd: &LatticeTable,
    grad: &mut [f32],
) {
    let nstate = logits.nstate();
    debug_assert_eq!(grad.len(), logits.nblk() * nstate);
    let sharp = ctx.sharpness();

    for (blk, grad_blk) in grad.chunks_exact_mut(nstate).enumerate() {
        let fwd_curr = fwd.row(blk);
        let fact = normalising_factor(fwd_curr, bwd.row(blk), sharp);
        gradient_step(ctx, logits.block(blk), seq, fwd_curr, bwd.row(blk + 1), fact, grad_blk);
    }
}

/// 1 バッチ要素の勾配
///
/// 系列長 0 の要素は全ブロック 0。テーブルはこの関数内で確保・破棄される。
pub fn element_gradient(ctx: &CatModContext<'_>, logits: &ElementLogits<'_>, seq: &Sequence<'_>, grad: &mut [f32]) {
    if seq.is_empty() {
        grad.fill(0.0);
        return;
    }
    let (fwd, _) = forward(ctx, logits, seq);
    let (bwd, _) = backward(ctx, logits, seq);
    gradient_from_tables(ctx, logits, seq, &fwd, &bwd, grad);
}
