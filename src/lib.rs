//! TT (Tensor-Train) 압축 라이브러리
//!
//! 밀집 선형/임베딩 레이어를 저랭크 TT 코어의 곱으로 교체한다.
//! 어떤 서브모듈을 어떤 랭크로 분해할지는 선언형 레시피로 정한다.

pub mod core;
pub mod error;
pub mod model;
pub mod recipe;

pub use crate::core::penalty::{
    attach_penalty, compute_penalty_metrics, PenaltyCollector, PenaltyConfig, PenaltyKind,
};
pub use crate::core::tt::{tt_svd, SeedMode, TtEmbedding, TtLayer, TtLinear, TtSchema};
pub use error::{Result, TtError};
pub use model::{HostConfig, Module};
pub use recipe::{
    apply_recipe, apply_recipe_with_progress, validate_recipe, CompressionSummary, Recipe, Target,
};
