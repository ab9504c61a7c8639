//! ロジット・勾配テンソル
//!
//! 形状は `(nblk, nbatch, nstate)`、状態が最内側の行優先。
//! バッチ要素 `b` のブロック `blk` のスコアベクトルは
//! `data[(blk·nbatch + b)·nstate ..][..nstate]`。

use crate::error::{FlipFlopError, FlipFlopResult};

/// テンソルの形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub nblk: usize,
    pub nbatch: usize,
    pub nstate: usize,
}

impl Shape {
    pub const fn new(nblk: usize, nbatch: usize, nstate: usize) -> Self {
        Self { nblk, nbatch, nstate }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.nblk * self.nbatch * self.nstate
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// ブロック間の stride（1 ブロック全バッチ分）
    #[inline]
    pub const fn block_stride(&self) -> usize {
        self.nbatch * self.nstate
    }

    /// `(blk, batch)` のスコアベクトル先頭位置
    #[inline]
    pub const fn offset(&self, blk: usize, batch: usize) -> usize {
        (blk * self.nbatch + batch) * self.nstate
    }
}

/// 読み取り専用ロジットテンソル
#[derive(Debug, Clone, Copy)]
pub struct LogitTensor<'a> {
    data: &'a [f32],
    shape: Shape,
}

impl<'a> LogitTensor<'a> {
    pub fn new(data: &'a [f32], shape: Shape) -> FlipFlopResult<Self> {
        if data.len() != shape.len() {
            return Err(FlipFlopError::LogitLength { expected: shape.len(), actual: data.len() });
        }
        Ok(Self { data, shape })
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// バッチ要素 `batch` のブロック `blk` のスコアベクトル
    #[inline]
    pub fn block(&self, blk: usize, batch: usize) -> &'a [f32] {
        let start = self.shape.offset(blk, batch);
        &self.data[start..start + self.shape.nstate]
    }

    /// バッチ要素 `batch` の全ブロックを参照するビュー
    #[inline]
    pub fn element(&self, batch: usize) -> ElementLogits<'a> {
        debug_assert!(batch < self.shape.nbatch);
        ElementLogits { tensor: *self, batch }
    }
}

/// 1 バッチ要素分のロジット（ブロック方向に stride 付き）
#[derive(Debug, Clone, Copy)]
pub struct ElementLogits<'a> {
    tensor: LogitTensor<'a>,
    batch: usize,
}

impl<'a> ElementLogits<'a> {
    #[inline]
    pub fn nblk(&self) -> usize {
        self.tensor.shape.nblk
    }

    #[inline]
    pub fn nstate(&self) -> usize {
        self.tensor.shape.nstate
    }

    #[inline]
    pub fn block(&self, blk: usize) -> &'a [f32] {
        self.tensor.block(blk, self.batch)
    }
}

/// 勾配テンソル（ロジットと同じ形状を所有する）
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTensor {
    data: Vec<f32>,
    shape: Shape,
}

impl GradientTensor {
    pub fn zeros(shape: Shape) -> Self {
        Self { data: vec![0.0; shape.len()], shape }
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn block(&self, blk: usize, batch: usize) -> &[f32] {
        let start = self.shape.offset(blk, batch);
        &self.data[start..start + self.shape.nstate]
    }
}
