//! 統合テスト共通ユーティリティ
#![allow(dead_code)]

use flipflop_core::flipflop::flip_flop_code;
use flipflop_core::{CatModBatch, CatModParams, Shape};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Deserialize;

/// 参照用フィクスチャ（TOML）
const REFERENCE_TOML: &str = include_str!("../data/cat_mod_reference.toml");

/// 1 回の呼び出し分の入力（所有版）
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub nblk: usize,
    pub nbatch: usize,
    pub nstate: usize,
    pub seqs: Vec<u32>,
    pub seqlens: Vec<usize>,
    pub mod_cats: Vec<u32>,
    /// 確率（`logits()` で対数を取る）
    #[serde(default)]
    pub probs: Vec<f32>,
    #[serde(skip)]
    pub logits: Vec<f32>,
    pub params: CatModParams,
}

impl Fixture {
    pub fn shape(&self) -> Shape {
        Shape::new(self.nblk, self.nbatch, self.nstate)
    }

    pub fn batch(&self) -> CatModBatch<'_> {
        CatModBatch::new(&self.logits, self.shape(), &self.seqs, &self.seqlens, &self.mod_cats, &self.params)
            .expect("fixture shape")
    }

    /// ロジットを差し替えたバッチ
    pub fn batch_with<'a>(&'a self, logits: &'a [f32]) -> CatModBatch<'a> {
        CatModBatch::new(logits, self.shape(), &self.seqs, &self.seqlens, &self.mod_cats, &self.params)
            .expect("fixture shape")
    }

    /// バッチ要素の並びを `perm` の順に入れ替える（新しい要素 i は元の要素 perm[i]）
    pub fn permuted(&self, perm: &[usize]) -> Fixture {
        assert_eq!(perm.len(), self.nbatch);
        let shape = self.shape();
        let starts: Vec<usize> = self
            .seqlens
            .iter()
            .scan(0, |acc, &len| {
                let s = *acc;
                *acc += len;
                Some(s)
            })
            .collect();

        let mut out = self.clone();
        out.seqs.clear();
        out.mod_cats.clear();
        out.seqlens.clear();
        for &src in perm {
            let range = starts[src]..starts[src] + self.seqlens[src];
            out.seqs.extend_from_slice(&self.seqs[range.clone()]);
            out.mod_cats.extend_from_slice(&self.mod_cats[range]);
            out.seqlens.push(self.seqlens[src]);
        }
        for blk in 0..self.nblk {
            for (dst, &src) in perm.iter().enumerate() {
                let to = shape.offset(blk, dst);
                let from = shape.offset(blk, src);
                out.logits[to..to + self.nstate].copy_from_slice(&self.logits[from..from + self.nstate]);
            }
        }
        out
    }
}

/// 参照用フィクスチャを読み込む
pub fn reference_fixture() -> Fixture {
    let mut fixture: Fixture = toml::from_str(REFERENCE_TOML).expect("reference fixture parses");
    fixture.logits = fixture.probs.iter().map(|p| p.ln()).collect();
    fixture
}

/// ランダムなバッチを生成する
///
/// ロジットは `ln(U(0.01, 1))`、系列はランダムな正準塩基列の flip-flop 符号化。
/// 各系列長は `nblk` 以下（全経路が実現可能）にすること。
pub fn random_fixture(seed: u64, nbase: usize, nblk: usize, seqlens: &[usize]) -> Fixture {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let mut can_mod_offsets = vec![0u32];
    for _ in 0..nbase {
        let ncat = rng.random_range(1..=3u32);
        can_mod_offsets.push(can_mod_offsets.last().copied().unwrap_or(0) + ncat);
    }
    let nmod = *can_mod_offsets.last().unwrap_or(&0) as usize;
    let nstate = flipflop_core::state_count(nbase, nmod);
    let params = CatModParams {
        mod_cat_weights: (0..nmod).map(|_| rng.random_range(0.5..2.0f32)).collect(),
        can_mod_offsets: can_mod_offsets.clone(),
        mod_weight: 1.0,
        sharpness: 1.0,
    };

    let mut seqs = Vec::new();
    let mut mod_cats = Vec::new();
    for &len in seqlens {
        assert!(len <= nblk, "sequence longer than the block count has no path");
        let bases: Vec<u8> = (0..len).map(|_| rng.random_range(0..nbase) as u8).collect();
        let states = flip_flop_code(&bases, nbase);
        for (pos, &state) in states.iter().enumerate() {
            let base = state as usize % nbase;
            let ncat = can_mod_offsets[base + 1] - can_mod_offsets[base];
            mod_cats.push(if pos == 0 { 0 } else { rng.random_range(0..ncat) });
        }
        seqs.extend(states);
    }

    let nbatch = seqlens.len();
    let logits: Vec<f32> = (0..nblk * nbatch * nstate).map(|_| rng.random_range(0.01..1.0f32).ln()).collect();

    Fixture {
        nblk,
        nbatch,
        nstate,
        seqs,
        seqlens: seqlens.to_vec(),
        mod_cats,
        probs: Vec::new(),
        logits,
        params,
    }
}

/// 中心差分で数値勾配を求め、解析勾配との最大誤差を返す
///
/// 全ブロック・全バッチ要素・全スロットを摂動する。
pub fn max_finite_difference_error(fixture: &Fixture, delta: f32) -> f32 {
    let analytic = fixture.batch().gradient();
    let shape = fixture.shape();
    let mut logits = fixture.logits.clone();
    let mut max_err = 0.0f32;

    for blk in 0..shape.nblk {
        for batch in 0..shape.nbatch {
            for slot in 0..shape.nstate {
                let idx = shape.offset(blk, batch) + slot;
                let orig = logits[idx];

                logits[idx] = orig + delta;
                let plus = fixture.batch_with(&logits).element_score(batch, flipflop_core::Direction::Forward);
                logits[idx] = orig - delta;
                let minus = fixture.batch_with(&logits).element_score(batch, flipflop_core::Direction::Forward);
                logits[idx] = orig;

                let numeric = (plus - minus) / (2.0 * delta);
                let err = (analytic.as_slice()[idx] - numeric).abs();
                max_err = max_err.max(err);
            }
        }
    }
    max_err
}
