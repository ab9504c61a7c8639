//! cat-mod flip-flop core
//!
//! 修飾カテゴリ付き flip-flop トランスデューサの前向き・後ろ向き対数尤度と、
//! ブロックごとの遷移スコアに対する勾配を計算する。
//!
//! # 入力
//!
//! - ロジット: 形状 `(nblk, nbatch, nstate)` の `f32`
//! - 遷移状態列・修飾カテゴリ列: 全要素を連結したもの + 要素ごとの系列長
//! - [`CatModParams`]: 修飾オフセット表・カテゴリ重み・修飾重み・sharpness
//!
//! # 例
//!
//! ```
//! use flipflop_core::{CatModBatch, CatModParams, Shape};
//!
//! let params = CatModParams::uniform(vec![0, 1, 2, 3, 4], 1.0);
//! let shape = Shape::new(3, 1, 44);
//! let logits = vec![-1.0f32; shape.len()];
//! let batch = CatModBatch::new(&logits, shape, &[0, 1], &[2], &[0, 0], &params).unwrap();
//!
//! let fwd = batch.scores_fwd();
//! let bwd = batch.scores_bwd();
//! assert!((fwd[0] - bwd[0]).abs() < 1e-4);
//! assert_eq!(batch.gradient().as_slice().len(), shape.len());
//! ```

pub mod backward;
pub mod context;
pub mod driver;
pub mod error;
pub mod flipflop;
pub mod forward;
pub mod gradient;
pub mod layout;
pub mod loss;
pub mod lse;
pub mod params;
pub mod sequence;
pub mod table;
pub mod tensor;

pub use driver::{CatModBatch, Direction};
pub use error::{FlipFlopError, FlipFlopResult};
pub use layout::{ScoreLayout, derive_nbase, state_count};
pub use params::CatModParams;
pub use tensor::{GradientTensor, LogitTensor, Shape};
