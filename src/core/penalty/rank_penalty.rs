//! 랭크 축소 엔트로피 페널티
//!
//! 학습 중 TT 레이어의 복원 가중치를 관찰해 언폴딩 특이값 스펙트럼의
//! Rényi/Shannon 엔트로피(또는 핵 노름)를 부가 손실로 계산한다.

use crate::core::math::{renyi_entropy, shannon_entropy, unfolding_singular_values};
use crate::core::tt::TtSchema;
use crate::error::Result;
use candle_core::Tensor;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// 스펙트럼 측도 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum PenaltyKind {
    Renyi,
    Shannon,
    /// 특이값 합 (알 수 없는 종류도 여기로)
    Nuclear,
}

impl From<String> for PenaltyKind {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "renyi" => PenaltyKind::Renyi,
            "shannon" => PenaltyKind::Shannon,
            _ => PenaltyKind::Nuclear,
        }
    }
}

/// 페널티 설정 (레시피 target의 `penalty` 항목)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyConfig {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: PenaltyKind,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(rename = "lambda", default = "default_lambda")]
    pub weight: f64,
}

fn default_kind() -> PenaltyKind {
    PenaltyKind::Renyi
}

fn default_alpha() -> f64 {
    2.0
}

fn default_lambda() -> f64 {
    1e-4
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            alpha: default_alpha(),
            weight: default_lambda(),
        }
    }
}

impl PenaltyConfig {
    /// 표준 페널티 설정
    pub fn standard(kind: PenaltyKind, alpha: f64, weight: f64) -> Self {
        Self { kind, alpha, weight }
    }

    /// 스펙트럼 하나에 대한 측도
    pub fn measure(&self, spectrum: &[f64]) -> f64 {
        match self.kind {
            PenaltyKind::Renyi => renyi_entropy(spectrum, self.alpha),
            PenaltyKind::Shannon => shannon_entropy(spectrum),
            PenaltyKind::Nuclear => spectrum.iter().sum(),
        }
    }
}

/// `lambda · Σ_k measure(spectrum_k)`
///
/// 가중치는 관찰만 하므로 계산 그래프에서 분리된 상태로 다룬다.
pub fn rank_penalty(weight: &Tensor, schema: &TtSchema, config: &PenaltyConfig) -> Result<f64> {
    let spectra = unfolding_singular_values(&weight.detach(), schema.out_modes(), schema.in_modes())?;
    let total: f64 = spectra.iter().map(|s| config.measure(s)).sum();
    Ok(config.weight * total)
}

/// 레이어가 소유하는 페널티 누산기
///
/// 순전파마다 덮어쓰고, 수집기가 읽으면서 0으로 되돌린다.
#[derive(Debug)]
pub struct PenaltySlot {
    config: PenaltyConfig,
    pending: Mutex<f64>,
}

impl PenaltySlot {
    pub fn new(config: PenaltyConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(0.0),
        }
    }

    pub fn config(&self) -> &PenaltyConfig {
        &self.config
    }

    /// 현재 가중치로 페널티 갱신. 실패는 0 페널티로 취급한다.
    pub fn observe(&self, weight: &Tensor, schema: &TtSchema) {
        let value = match rank_penalty(weight, schema, &self.config) {
            Ok(v) if v.is_finite() => v,
            Ok(v) => {
                debug!("페널티 값이 유한하지 않음 ({}), 0으로 처리", v);
                0.0
            }
            Err(e) => {
                debug!("페널티 계산 실패, 0으로 처리: {}", e);
                0.0
            }
        };
        *self.pending.lock() = value;
    }

    /// 대기 중인 페널티 (읽기만)
    pub fn pending(&self) -> f64 {
        *self.pending.lock()
    }

    /// 대기 중인 페널티를 꺼내고 0으로 초기화
    pub fn take(&self) -> f64 {
        std::mem::take(&mut *self.pending.lock())
    }
}
