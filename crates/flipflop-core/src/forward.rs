//! 前向き再帰
//!
//! 行 0 は位置 0 のみ 0、他は `-LARGE_VAL`（系列の先頭から開始する）。
//! 各ブロックで「留まる」項を先に計算し、「進む」項を log-sum-exp で合流させる。
//! 総スコアは最終行の最終位置。

use crate::context::CatModContext;
use crate::lse::log_sum_exp;
use crate::sequence::Sequence;
use crate::table::LatticeTable;
use crate::tensor::ElementLogits;

/// 前向き 1 ステップ（行 `prev` → 行 `curr`）
#[inline]
pub fn forward_step(
    ctx: &CatModContext<'_>,
    block: &[f32],
    seq: &Sequence<'_>,
    prev: &[f32],
    curr: &mut [f32],
) {
    let sharp = ctx.sharpness();

    // 留まる
    for (pos, (c, &p)) in curr.iter_mut().zip(prev).enumerate() {
        *c = ctx.remain_score(block, seq, pos) + p;
    }

    // 進む
    for pos in 1..seq.len() {
        let step = ctx.step(block, seq, pos);
        curr[pos] = log_sum_exp(curr[pos], prev[pos - 1] + step.can + step.modif, sharp);
    }
}

/// 前向きテーブルを計算し、テーブルと総スコアを返す
///
/// 系列長 0 の要素は呼び出し側（バッチドライバ）で除外すること。
pub fn forward(ctx: &CatModContext<'_>, logits: &ElementLogits<'_>, seq: &Sequence<'_>) -> (LatticeTable, f32) {
    assert!(!seq.is_empty(), "forward recursion requires a non-empty sequence");
    let nblk = logits.nblk();
    let mut fwd = LatticeTable::new(nblk, seq.len());
    fwd.row_mut(0)[0] = 0.0;

    for blk in 0..nblk {
        let (prev, curr) = fwd.rows_forward(blk);
        forward_step(ctx, logits.block(blk), seq, prev, curr);
    }

    let score = fwd.get(nblk, seq.len() - 1);
    (fwd, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlipFlopError;
    use crate::flipflop::TransitionViolation;
    use crate::layout::ScoreLayout;
    use crate::params::CatModParams;
    use crate::tensor::{LogitTensor, Shape};

    fn setup() -> (ScoreLayout, CatModParams) {
        let params = CatModParams::uniform(vec![0, 1, 2, 3, 4], 1.0);
        (params.layout(44).unwrap(), params)
    }

    #[test]
    fn test_single_position_sums_remain_scores() {
        let (layout, params) = setup();
        let ctx = CatModContext::new(&layout, &params);
        let shape = Shape::new(3, 1, 44);
        let mut data = vec![-5.0f32; shape.len()];
        // 状態 6 (G の flop) は stay 領域 32 + 6
        data[shape.offset(0, 0) + 38] = -0.5;
        data[shape.offset(1, 0) + 38] = -0.25;
        data[shape.offset(2, 0) + 38] = -1.0;
        let logits = LogitTensor::new(&data, shape).unwrap();

        let states = [6];
        let cats = [0];
        let seq = Sequence::new(&layout, &states, &cats).unwrap();
        let (table, score) = forward(&ctx, &logits.element(0), &seq);
        assert_eq!(table.nblk(), 3);
        assert!((score - (-1.75)).abs() < 1e-6);
    }

    #[test]
    fn test_two_positions_one_block_is_single_move() {
        let (layout, params) = setup();
        let ctx = CatModContext::new(&layout, &params);
        let shape = Shape::new(1, 1, 44);
        let mut data = vec![-3.0f32; shape.len()];
        data[8] = -0.1; // [1, 0]
        data[40 + 1] = -0.2; // C のカテゴリ 0
        let logits = LogitTensor::new(&data, shape).unwrap();

        let states = [0, 1];
        let cats = [0, 0];
        let seq = Sequence::new(&layout, &states, &cats).unwrap();
        let (table, score) = forward(&ctx, &logits.element(0), &seq);
        // 留まる経路は境界値から始まるので寄与しない
        assert!((score - (-0.3)).abs() < 1e-6);
        assert_eq!(table.get(1, 0), -3.0);
    }

    #[test]
    fn test_boundary_row() {
        let (layout, params) = setup();
        let ctx = CatModContext::new(&layout, &params);
        let shape = Shape::new(2, 1, 44);
        let data = vec![-1.0f32; shape.len()];
        let logits = LogitTensor::new(&data, shape).unwrap();
        let states = [0, 1, 2];
        let cats = [0, 0, 0];
        let seq = Sequence::new(&layout, &states, &cats).unwrap();
        let (table, _) = forward(&ctx, &logits.element(0), &seq);
        assert_eq!(table.row(0), &[0.0, -crate::table::LARGE_VAL, -crate::table::LARGE_VAL]);
    }

    #[test]
    fn test_repeated_state_never_reaches_recursion() {
        let (layout, _params) = setup();
        let states = [0, 1, 1];
        let cats = [0, 0, 0];
        let err = Sequence::new(&layout, &states, &cats).unwrap_err();
        assert_eq!(err, FlipFlopError::InvalidTransition(TransitionViolation::Repeat { pos: 2, state: 1 }));
    }
}
