//! flip-flop 符号化と遷移の検査
//!
//! 正準塩基列を遷移状態列に変換する。同じ塩基が連続する場合は flip と flop を
//! 交互に使うので、遷移状態列には同じ状態が連続しない。

use crate::layout::ScoreLayout;

/// 遷移状態列の不変条件違反
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionViolation {
    /// 状態番号が `2·nbase` 以上
    #[error("state {state} at position {pos} is out of range for {nbase} bases")]
    StateOutOfRange { pos: usize, state: usize, nbase: usize },

    /// 同じ状態が連続している
    #[error("repeated state {state} at position {pos}")]
    Repeat { pos: usize, state: usize },

    /// 正準塩基への遷移でも flip→flop のトグルでもない
    #[error("invalid move {from} -> {to} at position {pos}")]
    InvalidMove { pos: usize, from: usize, to: usize },

    /// 修飾カテゴリが遷移先塩基のカテゴリ数を超えている
    #[error("modification category {category} at position {pos} exceeds {ncat} categories of base {base}")]
    CategoryOutOfRange { pos: usize, base: usize, category: usize, ncat: usize },
}

/// 正準塩基列（各要素 `< nbase`）を flip-flop 遷移状態列に変換する
///
/// 直前と同じ塩基が続くとき、直前が flip なら flop（`base + nbase`）、flop なら flip を使う。
pub fn flip_flop_code(bases: &[u8], nbase: usize) -> Vec<u32> {
    let mut states = Vec::with_capacity(bases.len());
    let mut prev: Option<usize> = None;
    for &b in bases {
        let base = b as usize;
        assert!(base < nbase, "base {base} out of range for {nbase} bases");
        let state = match prev {
            Some(p) if p == base => base + nbase,
            Some(p) if p == base + nbase => base,
            _ => base,
        };
        states.push(state as u32);
        prev = Some(state);
    }
    states
}

/// 遷移状態列と修飾カテゴリ列が不変条件を満たすか検査する
///
/// 位置 0 の修飾カテゴリは使われないので検査しない。
pub fn check_transitions(
    layout: &ScoreLayout,
    states: &[u32],
    mod_cats: &[u32],
) -> Result<(), TransitionViolation> {
    let nbase = layout.nbase();
    for (pos, &s) in states.iter().enumerate() {
        let state = s as usize;
        if state >= 2 * nbase {
            return Err(TransitionViolation::StateOutOfRange { pos, state, nbase });
        }
        if pos == 0 {
            continue;
        }
        let from = states[pos - 1] as usize;
        if from == state {
            return Err(TransitionViolation::Repeat { pos, state });
        }
        if !layout.is_valid_move(state, from) {
            return Err(TransitionViolation::InvalidMove { pos, from, to: state });
        }
        let base = layout.canonical(state);
        let category = mod_cats[pos] as usize;
        let ncat = layout.mod_categories(base);
        if category >= ncat {
            return Err(TransitionViolation::CategoryOutOfRange { pos, base, category, ncat });
        }
    }
    Ok(())
}
