//! cat-mod flip-flop の入力フィクスチャ
//!
//! 1 回の呼び出し分の入力（形状・遷移状態列・修飾カテゴリ・スコア・パラメータ）を
//! TOML で保持する。スコアは確率 `probs`（対数を取って使う）かロジット `logits` の
//! どちらかで与える。

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use flipflop_core::flipflop::{check_transitions, flip_flop_code};
use flipflop_core::{CatModBatch, CatModParams, Shape, state_count};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::common::io::{open_writer, read_to_string};

/// 組み込みの参照用フィクスチャ
const REFERENCE_TOML: &str = include_str!("../../flipflop-core/tests/data/cat_mod_reference.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub nblk: usize,
    pub nbatch: usize,
    pub nstate: usize,
    pub seqs: Vec<u32>,
    pub seqlens: Vec<usize>,
    pub mod_cats: Vec<u32>,
    /// 確率（`logits` が空のときに使う）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probs: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logits: Vec<f32>,
    pub params: CatModParams,
}

impl Fixture {
    /// 組み込みの参照用フィクスチャ（nbase 4、2 要素、修飾カテゴリのみ入れ替えたもの）
    pub fn reference() -> Result<Self> {
        Self::from_toml(REFERENCE_TOML).context("built-in reference fixture")
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let fixture: Fixture = toml::from_str(text).context("failed to parse fixture TOML")?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// ファイル（"-" なら標準入力）から読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid fixture {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("failed to serialize fixture")
    }

    /// TOML でファイル（"-" なら標準出力）に書き出す
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_toml()?;
        let mut w = open_writer(path).with_context(|| format!("failed to create {}", path.display()))?;
        w.write_all(text.as_bytes())?;
        w.close().with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.nblk, self.nbatch, self.nstate)
    }

    /// 計算に使うロジット
    pub fn logits(&self) -> Vec<f32> {
        if self.logits.is_empty() {
            self.probs.iter().map(|p| p.ln()).collect()
        } else {
            self.logits.clone()
        }
    }

    /// 形状と遷移状態列を検査する
    ///
    /// 検査を通ったフィクスチャは [`Fixture::batch`] で panic しない。
    pub fn validate(&self) -> Result<()> {
        let shape = self.shape();
        match (self.probs.is_empty(), self.logits.is_empty()) {
            (true, true) => bail!("fixture has neither probs nor logits"),
            (false, false) => bail!("fixture has both probs and logits"),
            _ => {}
        }
        let nscore = self.probs.len().max(self.logits.len());
        ensure!(nscore == shape.len(), "expected {} scores for shape {:?}, got {nscore}", shape.len(), shape);
        ensure!(
            self.seqlens.len() == self.nbatch,
            "expected {} sequence lengths, got {}",
            self.nbatch,
            self.seqlens.len()
        );
        let total: usize = self.seqlens.iter().sum();
        ensure!(self.seqs.len() == total, "sequence lengths sum to {total}, got {} states", self.seqs.len());
        ensure!(self.mod_cats.len() == total, "expected {total} modification categories, got {}", self.mod_cats.len());

        let layout = self.params.layout(self.nstate)?;
        let mut start = 0;
        for (b, &len) in self.seqlens.iter().enumerate() {
            let range = start..start + len;
            check_transitions(&layout, &self.seqs[range.clone()], &self.mod_cats[range])
                .with_context(|| format!("batch element {b}"))?;
            start += len;
        }
        Ok(())
    }

    /// `logits` に対するバッチ
    pub fn batch<'a>(&'a self, logits: &'a [f32]) -> Result<CatModBatch<'a>> {
        Ok(CatModBatch::new(logits, self.shape(), &self.seqs, &self.seqlens, &self.mod_cats, &self.params)?)
    }

    /// ランダムな妥当フィクスチャを生成する
    ///
    /// 各塩基の修飾カテゴリ数は `1..=max_categories`、カテゴリ重みは `U(0.5, 2)`、
    /// 確率は `U(0.01, 1)`。系列はランダムな塩基列の flip-flop 符号化。
    pub fn random(seed: u64, nbase: usize, max_categories: u32, nblk: usize, seqlens: &[usize]) -> Result<Self> {
        ensure!(nbase > 0, "nbase must be positive");
        ensure!(max_categories > 0, "at least one modification category per base is required");
        ensure!(nbase <= u8::MAX as usize, "nbase {nbase} does not fit a base code");
        if let Some(&len) = seqlens.iter().find(|&&len| len > nblk + 1) {
            bail!("sequence length {len} cannot be reached in {nblk} blocks");
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let mut can_mod_offsets = Vec::with_capacity(nbase + 1);
        can_mod_offsets.push(0u32);
        let mut nmod = 0u32;
        for _ in 0..nbase {
            nmod += rng.random_range(1..=max_categories);
            can_mod_offsets.push(nmod);
        }
        let nstate = state_count(nbase, nmod as usize);
        let params = CatModParams {
            mod_cat_weights: (0..nmod).map(|_| rng.random_range(0.5..2.0f32)).collect(),
            can_mod_offsets,
            mod_weight: 1.0,
            sharpness: 1.0,
        };

        let mut seqs = Vec::new();
        let mut mod_cats = Vec::new();
        for &len in seqlens {
            let bases: Vec<u8> = (0..len).map(|_| rng.random_range(0..nbase) as u8).collect();
            for (pos, state) in flip_flop_code(&bases, nbase).into_iter().enumerate() {
                let base = state as usize % nbase;
                let ncat = params.can_mod_offsets[base + 1] - params.can_mod_offsets[base];
                mod_cats.push(if pos == 0 { 0 } else { rng.random_range(0..ncat) });
                seqs.push(state);
            }
        }

        let nbatch = seqlens.len();
        let probs = (0..nblk * nbatch * nstate).map(|_| rng.random_range(0.01..1.0f32)).collect();
        let fixture = Fixture {
            nblk,
            nbatch,
            nstate,
            seqs,
            seqlens: seqlens.to_vec(),
            mod_cats,
            probs,
            logits: Vec::new(),
            params,
        };
        fixture.validate()?;
        Ok(fixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_fixture_shape() {
        let fixture = Fixture::reference().unwrap();
        assert_eq!(fixture.shape(), Shape::new(7, 2, 45));
        assert_eq!(fixture.logits().len(), 7 * 2 * 45);
        assert_eq!(fixture.params.can_mod_offsets, vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn test_random_fixture_is_reproducible() {
        let a = Fixture::random(3, 4, 3, 8, &[3, 0, 9]).unwrap();
        let b = Fixture::random(3, 4, 3, 8, &[3, 0, 9]).unwrap();
        assert_eq!(a.seqs, b.seqs);
        assert_eq!(a.probs, b.probs);
        assert_eq!(a.params, b.params);
    }

    #[test]
    fn test_random_rejects_unreachable_length() {
        assert!(Fixture::random(3, 4, 2, 4, &[6]).is_err());
    }

    #[test]
    fn test_validate_reports_bad_transition() {
        let mut fixture = Fixture::reference().unwrap();
        fixture.seqs[1] = fixture.seqs[0];
        let err = fixture.validate().unwrap_err();
        assert!(format!("{err:#}").contains("repeated state"), "{err:#}");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        let fixture = Fixture::random(21, 4, 3, 5, &[4, 1]).unwrap();
        fixture.save(&path).unwrap();
        let back = Fixture::load(&path).unwrap();
        assert_eq!(back.seqs, fixture.seqs);
        assert_eq!(back.probs, fixture.probs);
        assert_eq!(back.params, fixture.params);
    }

    #[test]
    fn test_toml_roundtrip_keeps_scores() {
        let fixture = Fixture::random(9, 2, 2, 4, &[2, 3]).unwrap();
        let back = Fixture::from_toml(&fixture.to_toml().unwrap()).unwrap();
        assert_eq!(back.probs, fixture.probs);
        assert_eq!(back.mod_cats, fixture.mod_cats);
    }
}
