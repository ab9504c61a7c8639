//! 遷移スコアのレイアウト
//!
//! 1 ブロック分のスコアベクトル（長さ `nstate`）を 3 領域に分割する。
//!
//! # レイアウト
//!
//! ```text
//! [0 .. 2·nbase²)                     move 領域  slot = to·2·nbase + from  (to < nbase)
//! [2·nbase² .. 2·nbase² + 2·nbase)    stay 領域  slot = 2·nbase² + state
//! [2·nbase² + 2·nbase .. nstate)      mod 領域   slot = 2·nbase² + 2·nbase + offsets[can(to)] + cat
//! ```
//!
//! 状態 `s < nbase` は flip レジスタ、`nbase <= s < 2·nbase` は flop レジスタ。
//! flip から同じ塩基の flop への遷移（`to == from + nbase`）は move 領域を持たず、
//! stay 領域の `from` のスロットを遷移スコアとして使う。

use crate::error::{FlipFlopError, FlipFlopResult};

/// `2·nbase² + 2·nbase + nmod`
#[inline]
pub const fn state_count(nbase: usize, nmod: usize) -> usize {
    2 * nbase * nbase + 2 * nbase + nmod
}

/// 状態数とオフセット表から nbase を導出する
///
/// `nstate - offsets[last] = 2·nbase² + 2·nbase` を満たす正の整数 nbase が存在しなければ拒否。
/// オフセット表の長さが `nbase + 1` であることもここで確認する。
pub fn derive_nbase(nstate: usize, can_mod_offsets: &[u32]) -> FlipFlopResult<usize> {
    let nmod = *can_mod_offsets.last().ok_or(FlipFlopError::EmptyModOffsets)? as usize;
    if nmod > nstate {
        return Err(FlipFlopError::TooManyModCategories { nstate, nmod });
    }
    let ntrans = nstate - nmod;

    // 浮動小数点で近似解を求め、整数演算で厳密に検証する
    let approx = ((0.25 + 0.5 * ntrans as f64).sqrt() - 0.5).round() as usize;
    let nbase = [approx.saturating_sub(1), approx, approx + 1]
        .into_iter()
        .find(|&n| n > 0 && state_count(n, 0) == ntrans)
        .ok_or(FlipFlopError::NonIntegralBaseCount { nstate, nmod })?;

    if can_mod_offsets.len() != nbase + 1 {
        return Err(FlipFlopError::ModOffsetsLength {
            expected: nbase + 1,
            actual: can_mod_offsets.len(),
        });
    }
    Ok(nbase)
}

/// 遷移スコアレイアウト（nbase と修飾オフセット表を保持する値型）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLayout {
    nbase: usize,
    nstate: usize,
    offset_stay: usize,
    offset_mod: usize,
    mod_offsets: Vec<usize>,
}

impl ScoreLayout {
    /// 状態数とオフセット表からレイアウトを構築する
    pub fn new(nstate: usize, can_mod_offsets: &[u32]) -> FlipFlopResult<Self> {
        let nbase = derive_nbase(nstate, can_mod_offsets)?;
        if can_mod_offsets[0] != 0 {
            return Err(FlipFlopError::ModOffsetsNotMonotone(0));
        }
        if let Some(pos) = can_mod_offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(FlipFlopError::ModOffsetsNotMonotone(pos + 1));
        }
        let offset_stay = 2 * nbase * nbase;
        Ok(Self {
            nbase,
            nstate,
            offset_stay,
            offset_mod: offset_stay + 2 * nbase,
            mod_offsets: can_mod_offsets.iter().map(|&o| o as usize).collect(),
        })
    }

    #[inline]
    pub fn nbase(&self) -> usize {
        self.nbase
    }

    #[inline]
    pub fn nstate(&self) -> usize {
        self.nstate
    }

    /// 修飾カテゴリ総数
    #[inline]
    pub fn nmod(&self) -> usize {
        self.nstate - self.offset_mod
    }

    /// 塩基 `base` が持つ修飾カテゴリ数
    #[inline]
    pub fn mod_categories(&self, base: usize) -> usize {
        self.mod_offsets[base + 1] - self.mod_offsets[base]
    }

    /// flip/flop を区別しない正準塩基
    #[inline]
    pub fn canonical(&self, state: usize) -> usize {
        if state >= self.nbase { state - self.nbase } else { state }
    }

    /// 遷移 `from → to` が flip-flop の規則を満たすか
    #[inline]
    pub fn is_valid_move(&self, to: usize, from: usize) -> bool {
        to != from && (to < self.nbase || from + self.nbase == to)
    }

    // =========================================================================
    // スロット番号
    // =========================================================================

    /// move 領域 `[to, from]`
    #[inline]
    pub fn move_slot(&self, to: usize, from: usize) -> usize {
        debug_assert!(to < self.nbase && from < 2 * self.nbase);
        to * 2 * self.nbase + from
    }

    /// stay 領域
    #[inline]
    pub fn stay_slot(&self, state: usize) -> usize {
        debug_assert!(state < 2 * self.nbase);
        self.offset_stay + state
    }

    /// mod 領域（`mod_idx` は修飾カテゴリの通し番号）
    #[inline]
    pub fn mod_slot(&self, mod_idx: usize) -> usize {
        debug_assert!(mod_idx < self.nmod());
        self.offset_mod + mod_idx
    }

    /// 位置に留まるときのスロット
    ///
    /// flip 状態は move 領域の対角 `[state, state]`、flop 状態は stay 領域を使う。
    #[inline]
    pub fn remain_slot(&self, state: usize) -> usize {
        if state < self.nbase { self.move_slot(state, state) } else { self.stay_slot(state) }
    }

    /// 位置 p-1 → p の遷移スロット（正準塩基への遷移なら move 領域、トグルなら stay 領域の `from`）
    #[inline]
    pub fn step_slot(&self, to: usize, from: usize) -> usize {
        if to < self.nbase { self.move_slot(to, from) } else { self.stay_slot(from) }
    }

    /// 遷移先 `to` とカテゴリ `category` から修飾カテゴリの通し番号を求める
    #[inline]
    pub fn mod_index(&self, to: usize, category: usize) -> usize {
        self.mod_offsets[self.canonical(to)] + category
    }

    // =========================================================================
    // スコア参照
    // =========================================================================

    #[inline]
    pub fn move_score(&self, block: &[f32], to: usize, from: usize) -> f32 {
        block[self.move_slot(to, from)]
    }

    #[inline]
    pub fn stay_score(&self, block: &[f32], state: usize) -> f32 {
        block[self.stay_slot(state)]
    }

    #[inline]
    pub fn mod_score(&self, block: &[f32], mod_idx: usize) -> f32 {
        block[self.mod_slot(mod_idx)]
    }

    #[inline]
    pub fn remain_score(&self, block: &[f32], state: usize) -> f32 {
        block[self.remain_slot(state)]
    }

    #[inline]
    pub fn step_score(&self, block: &[f32], to: usize, from: usize) -> f32 {
        block[self.step_slot(to, from)]
    }
}
