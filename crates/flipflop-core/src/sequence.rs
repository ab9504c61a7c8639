//! 連結された系列配列のバッチビュー
//!
//! 全バッチ要素の遷移状態列・修飾カテゴリ列は 1 本に連結されて渡される。
//! 系列長の累積和で各要素の開始位置を求める。
//!
//! [`Sequence`] は遷移の不変条件を満たすものしか構築できない。単独で作るときは
//! [`Sequence::new`] が検査し、バッチからはドライバが検査を済ませた要素だけを切り出す。

use crate::error::{FlipFlopError, FlipFlopResult};
use crate::flipflop::check_transitions;
use crate::layout::ScoreLayout;

/// 1 バッチ要素の系列（検査済み）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence<'a> {
    /// 遷移状態列
    pub(crate) states: &'a [u32],
    /// 各位置への遷移の修飾カテゴリ（位置 0 は未使用）
    pub(crate) mod_cats: &'a [u32],
}

impl<'a> Sequence<'a> {
    /// 長さと遷移の不変条件を検査して系列を構築する
    pub fn new(layout: &ScoreLayout, states: &'a [u32], mod_cats: &'a [u32]) -> FlipFlopResult<Self> {
        if states.len() != mod_cats.len() {
            return Err(FlipFlopError::ModCategoryLength {
                expected: states.len(),
                actual: mod_cats.len(),
            });
        }
        check_transitions(layout, states, mod_cats)?;
        Ok(Self { states, mod_cats })
    }

    #[inline]
    pub fn states(&self) -> &'a [u32] {
        self.states
    }

    #[inline]
    pub fn mod_cats(&self) -> &'a [u32] {
        self.mod_cats
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub(crate) fn state(&self, pos: usize) -> usize {
        self.states[pos] as usize
    }

    #[inline]
    pub(crate) fn category(&self, pos: usize) -> usize {
        self.mod_cats[pos] as usize
    }
}

/// 連結系列のバッチ
#[derive(Debug, Clone)]
pub struct SequenceBatch<'a> {
    seqs: &'a [u32],
    mod_cats: &'a [u32],
    seqlens: &'a [usize],
    starts: Vec<usize>,
}

impl<'a> SequenceBatch<'a> {
    pub fn new(seqs: &'a [u32], seqlens: &'a [usize], mod_cats: &'a [u32]) -> FlipFlopResult<Self> {
        let starts: Vec<usize> = seqlens
            .iter()
            .scan(0usize, |acc, &len| {
                let start = *acc;
                *acc += len;
                Some(start)
            })
            .collect();
        let total: usize = seqlens.iter().sum();
        if total != seqs.len() {
            return Err(FlipFlopError::SequenceLength { expected: total, actual: seqs.len() });
        }
        if mod_cats.len() != seqs.len() {
            return Err(FlipFlopError::ModCategoryLength {
                expected: seqs.len(),
                actual: mod_cats.len(),
            });
        }
        Ok(Self { seqs, mod_cats, seqlens, starts })
    }

    #[inline]
    pub fn nbatch(&self) -> usize {
        self.seqlens.len()
    }

    #[inline]
    pub fn seqlens(&self) -> &'a [usize] {
        self.seqlens
    }

    /// バッチ要素 `batch` の系列（[`SequenceBatch::assert_valid`] 済みであること）
    #[inline]
    pub(crate) fn element(&self, batch: usize) -> Sequence<'a> {
        let range = self.starts[batch]..self.starts[batch] + self.seqlens[batch];
        Sequence { states: &self.seqs[range.clone()], mod_cats: &self.mod_cats[range] }
    }

    /// 全要素の不変条件を検査する（違反があれば panic）
    pub fn assert_valid(&self, layout: &ScoreLayout) {
        for batch in 0..self.nbatch() {
            let seq = self.element(batch);
            if let Err(violation) = check_transitions(layout, seq.states, seq.mod_cats) {
                panic!("invalid flip-flop sequence in batch element {batch}: {violation}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flipflop::TransitionViolation;

    #[test]
    fn test_prefix_offsets() {
        let seqs = [0, 1, 2, 3, 0, 2];
        let cats = [0, 0, 0, 0, 0, 0];
        let lens = [2, 0, 3, 1];
        let batch = SequenceBatch::new(&seqs, &lens, &cats).unwrap();
        assert_eq!(batch.nbatch(), 4);
        assert_eq!(batch.element(0).states, &[0, 1]);
        assert!(batch.element(1).is_empty());
        assert_eq!(batch.element(2).states, &[2, 3, 0]);
        assert_eq!(batch.element(3).states, &[2]);
    }

    #[test]
    fn test_length_mismatch() {
        let seqs = [0, 1, 2];
        assert_eq!(
            SequenceBatch::new(&seqs, &[2, 2], &[0, 0, 0]).unwrap_err(),
            FlipFlopError::SequenceLength { expected: 4, actual: 3 }
        );
        assert_eq!(
            SequenceBatch::new(&seqs, &[3], &[0, 0]).unwrap_err(),
            FlipFlopError::ModCategoryLength { expected: 3, actual: 2 }
        );
        let layout = ScoreLayout::new(45, &[0, 1, 3, 4, 5]).unwrap();
        assert!(Sequence::new(&layout, &seqs, &[0]).is_err());
    }

    #[test]
    fn test_sequence_rejects_broken_transitions() {
        let layout = ScoreLayout::new(45, &[0, 1, 3, 4, 5]).unwrap();
        assert_eq!(
            Sequence::new(&layout, &[0, 1, 1], &[0, 0, 0]).unwrap_err(),
            FlipFlopError::InvalidTransition(TransitionViolation::Repeat { pos: 2, state: 1 })
        );
        // C の flip から G の flop へのトグルは不正
        assert_eq!(
            Sequence::new(&layout, &[0, 1, 6], &[0, 0, 0]).unwrap_err(),
            FlipFlopError::InvalidTransition(TransitionViolation::InvalidMove { pos: 2, from: 1, to: 6 })
        );
        // C のカテゴリは 2 つ
        assert!(Sequence::new(&layout, &[0, 1], &[0, 2]).is_err());

        let seq = Sequence::new(&layout, &[0, 1, 5], &[0, 1, 1]).unwrap();
        assert_eq!(seq.states(), &[0, 1, 5]);
        assert_eq!(seq.mod_cats(), &[0, 1, 1]);
    }

    #[test]
    #[should_panic(expected = "batch element 1")]
    fn test_assert_valid_reports_element() {
        let layout = ScoreLayout::new(45, &[0, 1, 3, 4, 5]).unwrap();
        let seqs = [0, 1, 2, 2];
        let cats = [0, 0, 0, 0];
        SequenceBatch::new(&seqs, &[2, 2], &cats).unwrap().assert_valid(&layout);
    }
}
