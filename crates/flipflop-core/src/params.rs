//! 修飾カテゴリのパラメータ
//!
//! 1 回の呼び出しで全バッチ要素が共有する読み取り専用の設定。
//! TOML/JSON から読み込めるよう serde に対応する。

use serde::{Deserialize, Serialize};

use crate::error::{FlipFlopError, FlipFlopResult};
use crate::layout::ScoreLayout;

/// 修飾カテゴリのパラメータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatModParams {
    /// 正準塩基ごとの修飾カテゴリ開始オフセット（長さ nbase + 1、末尾はカテゴリ総数）
    pub can_mod_offsets: Vec<u32>,
    /// カテゴリごとの重み（希少カテゴリの重み付け）
    pub mod_cat_weights: Vec<f32>,
    /// 修飾スコア全体の重み
    pub mod_weight: f32,
    /// log-sum-exp の sharpness（1.0 で厳密な周辺尤度）
    #[serde(default = "default_sharpness")]
    pub sharpness: f32,
}

fn default_sharpness() -> f32 {
    1.0
}

impl CatModParams {
    /// 全カテゴリの重みを 1.0 にしたパラメータ
    pub fn uniform(can_mod_offsets: Vec<u32>, mod_weight: f32) -> Self {
        let nmod = can_mod_offsets.last().copied().unwrap_or(0) as usize;
        Self {
            can_mod_offsets,
            mod_cat_weights: vec![1.0; nmod],
            mod_weight,
            sharpness: default_sharpness(),
        }
    }

    pub fn with_sharpness(mut self, sharpness: f32) -> Self {
        self.sharpness = sharpness;
        self
    }

    /// 状態数に対してレイアウトを導出し、パラメータ全体を検証する
    pub fn layout(&self, nstate: usize) -> FlipFlopResult<ScoreLayout> {
        let layout = ScoreLayout::new(nstate, &self.can_mod_offsets)?;
        if self.mod_cat_weights.len() != layout.nmod() {
            return Err(FlipFlopError::ModWeightsLength {
                expected: layout.nmod(),
                actual: self.mod_cat_weights.len(),
            });
        }
        if !(self.sharpness > 0.0 && self.sharpness.is_finite()) {
            return Err(FlipFlopError::InvalidSharpness(self.sharpness));
        }
        Ok(layout)
    }

    /// 修飾カテゴリ `mod_idx` のスコアに掛かる係数 `mod_weight · weight[mod_idx]`
    #[inline]
    pub fn mod_scale(&self, mod_idx: usize) -> f32 {
        self.mod_weight * self.mod_cat_weights[mod_idx]
    }
}
