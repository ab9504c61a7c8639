//! 前向き・後ろ向き・勾配の整合性チェック
//!
//! - 前向きスコアと後ろ向きスコアの差
//! - 要素 0 と要素 1 の勾配の差（テンソル全体と、修飾領域を除いた正準領域）
//! - 中心差分による数値勾配と解析勾配の差

use std::ops::Range;

use anyhow::Result;
use flipflop_core::{Direction, GradientTensor, ScoreLayout};
use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::fixture::Fixture;

/// 中心差分の既定の刻み幅
pub const DEFAULT_DELTA: f32 = 1e-2;

/// 1 スロット分の微分
#[derive(Debug, Clone, Serialize)]
pub struct Derivative {
    pub blk: usize,
    pub batch: usize,
    pub slot: usize,
    /// 解析勾配
    pub analytic: f32,
    /// 中心差分
    pub numeric: f32,
    /// `|analytic - numeric|`
    pub diff: f32,
    /// `analytic / numeric`
    pub ratio: f32,
}

/// チェック結果（JSON 出力用）
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub nblk: usize,
    pub nbatch: usize,
    pub nstate: usize,
    pub nbase: usize,
    pub sharpness: f32,
    pub scores_fwd: Vec<f32>,
    pub scores_bwd: Vec<f32>,
    /// 要素ごとの `|fwd - bwd|` の最大値
    pub max_score_delta: f32,
    /// 要素 0 と 1 の勾配差の最大値（要素が 2 つ以上のとき）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_grad_delta: Option<f32>,
    /// 同上、move/stay 領域のみ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_canonical_grad_delta: Option<f32>,
    /// 中心差分との差の最大値（`delta` 指定時）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fd_error: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivatives: Option<Vec<Derivative>>,
}

/// 要素 `a` と `b` の勾配差の最大値（各ブロックの `slots` の範囲）
pub fn max_gradient_delta(grad: &GradientTensor, a: usize, b: usize, slots: Range<usize>) -> f32 {
    let mut max_delta = 0.0f32;
    for blk in 0..grad.shape().nblk {
        let ga = &grad.block(blk, a)[slots.clone()];
        let gb = &grad.block(blk, b)[slots.clone()];
        for (x, y) in ga.iter().zip(gb) {
            max_delta = max_delta.max((x - y).abs());
        }
    }
    max_delta
}

/// 全ブロック・全要素・全スロットについて中心差分を求める
///
/// ブロック単位で並列に計算する。スロットを摂動したら、その要素の前向きスコアだけを再計算する。
pub fn finite_differences(fixture: &Fixture, grad: &GradientTensor, delta: f32) -> Result<Vec<Derivative>> {
    let shape = fixture.shape();
    let logits = fixture.logits();

    let per_block: Vec<Vec<Derivative>> = (0..shape.nblk)
        .into_par_iter()
        .map(|blk| -> Result<Vec<Derivative>> {
            let mut perturbed = logits.clone();
            let mut out = Vec::with_capacity(shape.nbatch * shape.nstate);
            for batch in 0..shape.nbatch {
                let block = grad.block(blk, batch);
                for slot in 0..shape.nstate {
                    let idx = shape.offset(blk, batch) + slot;
                    let orig = perturbed[idx];

                    perturbed[idx] = orig + delta;
                    let plus = fixture.batch(&perturbed)?.element_score(batch, Direction::Forward);
                    perturbed[idx] = orig - delta;
                    let minus = fixture.batch(&perturbed)?.element_score(batch, Direction::Forward);
                    perturbed[idx] = orig;

                    let numeric = (plus - minus) / (2.0 * delta);
                    let analytic = block[slot];
                    out.push(Derivative {
                        blk,
                        batch,
                        slot,
                        analytic,
                        numeric,
                        diff: (analytic - numeric).abs(),
                        ratio: analytic / numeric,
                    });
                }
            }
            Ok(out)
        })
        .collect::<Result<_>>()?;

    Ok(per_block.into_iter().flatten().collect())
}

/// フィクスチャ全体をチェックする
///
/// `delta` を与えると中心差分も計算し、`keep_derivatives` なら全スロットの表を残す。
pub fn check(fixture: &Fixture, delta: Option<f32>, keep_derivatives: bool) -> Result<CheckReport> {
    let logits = fixture.logits();
    let batch = fixture.batch(&logits)?;
    let layout: &ScoreLayout = batch.layout();

    let scores_fwd = batch.scores_fwd();
    let scores_bwd = batch.scores_bwd();
    let max_score_delta = scores_fwd.iter().zip(&scores_bwd).map(|(f, b)| (f - b).abs()).fold(0.0, f32::max);
    let grad = batch.gradient();

    let (max_grad_delta, max_canonical_grad_delta) = if fixture.nbatch >= 2 {
        (
            Some(max_gradient_delta(&grad, 0, 1, 0..layout.nstate())),
            Some(max_gradient_delta(&grad, 0, 1, 0..layout.mod_slot(0))),
        )
    } else {
        (None, None)
    };

    let (max_fd_error, derivatives) = match delta {
        Some(delta) => {
            let derivs = finite_differences(fixture, &grad, delta)?;
            let max_err = derivs.iter().map(|d| d.diff).fold(0.0, f32::max);
            debug!("finite differences: {} slots, max error {max_err}", derivs.len());
            (Some(max_err), keep_derivatives.then_some(derivs))
        }
        None => (None, None),
    };

    Ok(CheckReport {
        nblk: fixture.nblk,
        nbatch: fixture.nbatch,
        nstate: fixture.nstate,
        nbase: layout.nbase(),
        sharpness: fixture.params.sharpness,
        scores_fwd,
        scores_bwd,
        max_score_delta,
        max_grad_delta,
        max_canonical_grad_delta,
        max_fd_error,
        derivatives,
    })
}
