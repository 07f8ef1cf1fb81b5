//! TT 압축 핵심 구성 요소
//!
//! 수학 기본 연산, TT 레이어, 랭크 페널티

pub mod math;
pub mod penalty;
pub mod tt;

pub use penalty::{PenaltyConfig, PenaltyKind};
pub use tt::{SeedMode, TtEmbedding, TtLayer, TtLinear, TtSchema};
