//! TT 압축 엔진 에러 타입

use thiserror::Error;

/// 라이브러리 전반의 Result 별칭
pub type Result<T> = std::result::Result<T, TtError>;

/// TT 압축 과정에서 발생하는 에러
#[derive(Debug, Error)]
pub enum TtError {
    /// 잘못된 모드/랭크 스키마, 지원하지 않는 분해 방식 등 (항상 치명적)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 선언된 모드 곱과 실제 레이어 차원 불일치
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// 경로 탐색 실패 (속성 없음, 인덱스 범위 초과 등)
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// TT 변환을 지원하지 않는 모듈
    #[error("Unsupported module: {0}")]
    Unsupported(String),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TtError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn shape_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// 구성 에러 여부 (스키마 자체가 잘못된 경우)
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}
