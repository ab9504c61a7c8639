//! 1 ブロック分の遷移スコア参照
//!
//! 前向き・後ろ向き・勾配の各再帰は同じ規則でスコアを読むので、ここにまとめる。

use crate::layout::ScoreLayout;
use crate::params::CatModParams;
use crate::sequence::Sequence;

/// レイアウトとパラメータの組（全バッチ要素で共有、読み取り専用）
#[derive(Debug, Clone, Copy)]
pub struct CatModContext<'a> {
    pub layout: &'a ScoreLayout,
    pub params: &'a CatModParams,
}

/// 位置 p-1 → p の遷移スコア
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepScore {
    /// 正準遷移（またはトグル）のスロット
    pub can_slot: usize,
    /// 修飾スコアのスロット
    pub mod_slot: usize,
    /// `mod_weight · mod_cat_weights[mod_idx]`
    pub mod_scale: f32,
    /// 正準遷移スコア
    pub can: f32,
    /// 重み付き修飾スコア
    pub modif: f32,
}

impl StepScore {
    #[inline]
    pub fn total(&self) -> f32 {
        self.can + self.modif
    }
}

impl<'a> CatModContext<'a> {
    pub fn new(layout: &'a ScoreLayout, params: &'a CatModParams) -> Self {
        Self { layout, params }
    }

    #[inline]
    pub fn sharpness(&self) -> f32 {
        self.params.sharpness
    }

    /// 位置 `pos` に留まるスロット
    #[inline]
    pub fn remain_slot(&self, seq: &Sequence<'_>, pos: usize) -> usize {
        self.layout.remain_slot(seq.state(pos))
    }

    /// 位置 `pos` に留まるスコア
    #[inline]
    pub fn remain_score(&self, block: &[f32], seq: &Sequence<'_>, pos: usize) -> f32 {
        block[self.remain_slot(seq, pos)]
    }

    /// 位置 `pos - 1` から `pos` への遷移スコア（`pos >= 1`）
    #[inline]
    pub fn step(&self, block: &[f32], seq: &Sequence<'_>, pos: usize) -> StepScore {
        let to = seq.state(pos);
        let from = seq.state(pos - 1);
        debug_assert!(to != from, "repeated state {to} at position {pos}");
        debug_assert!(self.layout.is_valid_move(to, from), "invalid move {from} -> {to} at position {pos}");

        let can_slot = self.layout.step_slot(to, from);
        let mod_idx = self.layout.mod_index(to, seq.category(pos));
        let mod_slot = self.layout.mod_slot(mod_idx);
        let mod_scale = self.params.mod_scale(mod_idx);
        StepScore {
            can_slot,
            mod_slot,
            mod_scale,
            can: block[can_slot],
            modif: mod_scale * block[mod_slot],
        }
    }
}
