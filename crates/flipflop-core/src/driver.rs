//! バッチドライバ
//!
//! 連結系列を系列長の累積和で切り出し、バッチ要素ごとに独立に前向き・後ろ向き・勾配を計算する。
//! 要素間で書き込みを共有しないので rayon の並列 map でそのまま分配できる。
//! テーブルは要素のタスク内で確保し、タスクの終わりで破棄する。
//! 結果はスケジューリングやスレッド数に依らずビット単位で一致する。

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::backward::backward;
use crate::context::CatModContext;
use crate::error::{FlipFlopError, FlipFlopResult};
use crate::forward::forward;
use crate::gradient::element_gradient;
use crate::layout::ScoreLayout;
use crate::params::CatModParams;
use crate::sequence::SequenceBatch;
use crate::tensor::{GradientTensor, LogitTensor, Shape};

/// スコアの計算方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// 1 回の呼び出しの入力一式（全て読み取り専用）
#[derive(Debug, Clone)]
pub struct CatModBatch<'a> {
    logits: LogitTensor<'a>,
    seqs: SequenceBatch<'a>,
    params: &'a CatModParams,
    layout: ScoreLayout,
}

impl<'a> CatModBatch<'a> {
    /// 入力を検証してバッチを構築する
    ///
    /// 形状・設定の不整合は `Err`、遷移状態列の不変条件違反は panic。
    pub fn new(
        logits: &'a [f32],
        shape: Shape,
        seqs: &'a [u32],
        seqlens: &'a [usize],
        mod_cats: &'a [u32],
        params: &'a CatModParams,
    ) -> FlipFlopResult<Self> {
        let layout = params.layout(shape.nstate)?;
        let logits = LogitTensor::new(logits, shape)?;
        if seqlens.len() != shape.nbatch {
            return Err(FlipFlopError::BatchLength { expected: shape.nbatch, actual: seqlens.len() });
        }
        let seqs = SequenceBatch::new(seqs, seqlens, mod_cats)?;
        seqs.assert_valid(&layout);

        Ok(Self { logits, seqs, params, layout })
    }

    #[inline]
    pub fn layout(&self) -> &ScoreLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.logits.shape()
    }

    #[inline]
    pub fn params(&self) -> &CatModParams {
        self.params
    }

    #[inline]
    fn context(&self) -> CatModContext<'_> {
        CatModContext::new(&self.layout, self.params)
    }

    fn log_call(&self, what: &str) {
        let shape = self.shape();
        debug!(
            "cat_mod {what}: nbase={} nmod={} nblk={} nbatch={} sharpness={}",
            self.layout.nbase(),
            self.layout.nmod(),
            shape.nblk,
            shape.nbatch,
            self.params.sharpness
        );
    }

    /// バッチ要素 `batch` の総スコア（系列長 0 なら 0）
    pub fn element_score(&self, batch: usize, direction: Direction) -> f32 {
        let seq = self.seqs.element(batch);
        if seq.is_empty() {
            return 0.0;
        }
        let ctx = self.context();
        let logits = self.logits.element(batch);
        let (_table, score) = match direction {
            Direction::Forward => forward(&ctx, &logits, &seq),
            Direction::Backward => backward(&ctx, &logits, &seq),
        };
        trace!("batch element {batch}: len={} {direction:?} score={score}", seq.len());
        score
    }

    /// 全要素の総スコアを `score` に書き込む
    pub fn scores_into(&self, direction: Direction, score: &mut [f32]) -> FlipFlopResult<()> {
        let nbatch = self.shape().nbatch;
        if score.len() != nbatch {
            return Err(FlipFlopError::OutputLength { expected: nbatch, actual: score.len() });
        }
        self.fill_scores(direction, score);
        Ok(())
    }

    /// 前向き再帰による総スコア
    pub fn scores_fwd(&self) -> Vec<f32> {
        let mut score = vec![0.0; self.shape().nbatch];
        self.fill_scores(Direction::Forward, &mut score);
        score
    }

    /// 後ろ向き再帰による総スコア
    pub fn scores_bwd(&self) -> Vec<f32> {
        let mut score = vec![0.0; self.shape().nbatch];
        self.fill_scores(Direction::Backward, &mut score);
        score
    }

    fn fill_scores(&self, direction: Direction, score: &mut [f32]) {
        self.log_call(match direction {
            Direction::Forward => "forward scores",
            Direction::Backward => "backward scores",
        });

        score
            .par_iter_mut()
            .enumerate()
            .for_each(|(batch, s)| *s = self.element_score(batch, direction));

        for (batch, s) in score.iter().enumerate() {
            if !s.is_finite() {
                warn!("non-finite {direction:?} score {s} for batch element {batch}");
            }
        }
    }

    /// 勾配をロジットと同じ形状の `grad` に書き込む
    pub fn gradient_into(&self, grad: &mut [f32]) -> FlipFlopResult<()> {
        let shape = self.shape();
        if grad.len() != shape.len() {
            return Err(FlipFlopError::OutputLength { expected: shape.len(), actual: grad.len() });
        }
        self.fill_gradient(grad);
        Ok(())
    }

    /// 勾配テンソル
    pub fn gradient(&self) -> GradientTensor {
        let mut grad = GradientTensor::zeros(self.shape());
        self.fill_gradient(grad.as_mut_slice());
        grad
    }

    /// 各要素は自分の作業領域（`nblk × nstate`）で計算し、最後に所定の位置へ配置する
    fn fill_gradient(&self, grad: &mut [f32]) {
        let shape = self.shape();
        self.log_call("gradient");

        let per_element: Vec<Vec<f32>> = (0..shape.nbatch)
            .into_par_iter()
            .map(|batch| {
                let mut local = vec![0.0f32; shape.nblk * shape.nstate];
                element_gradient(&self.context(), &self.logits.element(batch), &self.seqs.element(batch), &mut local);
                local
            })
            .collect();

        for (batch, local) in per_element.iter().enumerate() {
            for (blk, src) in local.chunks_exact(shape.nstate).enumerate() {
                let start = shape.offset(blk, batch);
                grad[start..start + shape.nstate].copy_from_slice(src);
            }
        }
    }
}
