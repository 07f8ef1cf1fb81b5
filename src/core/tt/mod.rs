//! 텐서 트레인 레이어
//!
//! 스키마 검증, 코어 소유, 축약 복원, TT-SVD 시드, 선형/임베딩 변형

pub mod cores;
pub mod embedding;
pub mod layer;
pub mod linear;
pub mod schema;
pub mod ttsvd;


pub use cores::{CoreSnapshot, TtCores};
pub use embedding::TtEmbedding;
pub use layer::{LayerState, TtLayer};
pub use linear::{SeedMode, TtLinear};
pub use schema::TtSchema;
pub use ttsvd::{relative_error, tt_svd};
