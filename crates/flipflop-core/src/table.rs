//! 前向き・後ろ向きテーブル
//!
//! 1 バッチ要素分の `(nblk + 1) × nseqpos` の対数領域テーブル。
//! 要素の処理ごとに確保し、処理の終わりで破棄する（呼び出しをまたいで再利用しない）。

/// −∞ の代わりに使う境界値
pub const LARGE_VAL: f32 = 1e30;

/// 格子テーブル
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeTable {
    data: Vec<f32>,
    nseqpos: usize,
}

impl LatticeTable {
    /// 全セルを `-LARGE_VAL` で初期化したテーブル
    pub fn new(nblk: usize, nseqpos: usize) -> Self {
        assert!(nseqpos > 0);
        Self { data: vec![-LARGE_VAL; (nblk + 1) * nseqpos], nseqpos }
    }

    /// ブロック数（行数 - 1）
    #[inline]
    pub fn nblk(&self) -> usize {
        self.data.len() / self.nseqpos - 1
    }

    #[inline]
    pub fn nseqpos(&self) -> usize {
        self.nseqpos
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.nseqpos..(r + 1) * self.nseqpos]
    }

    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        &mut self.data[r * self.nseqpos..(r + 1) * self.nseqpos]
    }

    /// 隣接する 2 行 `(r, r + 1)` を取り出す（前者を読み、後者を書く）
    #[inline]
    pub fn rows_forward(&mut self, r: usize) -> (&[f32], &mut [f32]) {
        let (head, tail) = self.data.split_at_mut((r + 1) * self.nseqpos);
        (&head[r * self.nseqpos..], &mut tail[..self.nseqpos])
    }

    /// 隣接する 2 行 `(r + 1, r)` を取り出す（前者を読み、後者を書く）
    #[inline]
    pub fn rows_backward(&mut self, r: usize) -> (&[f32], &mut [f32]) {
        let (head, tail) = self.data.split_at_mut((r + 1) * self.nseqpos);
        (&tail[..self.nseqpos], &mut head[r * self.nseqpos..])
    }

    #[inline]
    pub fn get(&self, r: usize, pos: usize) -> f32 {
        self.data[r * self.nseqpos + pos]
    }
}
