//! 레이어 단위 진행 이벤트
//!
//! 스트리밍 소비자(진행 막대, 웹소켓 등)를 위해 직렬화 가능하다.

use crate::core::tt::{CoreSnapshot, TtLayer};
use crate::error::Result;
use serde::Serialize;

/// 스냅샷에 담는 코어당 최대 값 개수
pub const MAX_SNAPSHOT_VALUES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LayerOutcome {
    Replaced,
    Failed { error: String },
}

/// 새 TT 레이어의 구조 요약
#[derive(Debug, Clone, Serialize)]
pub struct LayerSnapshot {
    pub in_modes: Vec<usize>,
    pub out_modes: Vec<usize>,
    pub ranks: Vec<usize>,
    pub num_parameters: usize,
    pub cores: Vec<CoreSnapshot>,
}

impl LayerSnapshot {
    pub fn capture(layer: &dyn TtLayer) -> Result<Self> {
        let schema = layer.schema();
        Ok(Self {
            in_modes: schema.in_modes().to_vec(),
            out_modes: schema.out_modes().to_vec(),
            ranks: schema.ranks().to_vec(),
            num_parameters: layer.num_parameters(),
            cores: layer.cores().snapshot(MAX_SNAPSHOT_VALUES)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerProgress {
    /// 1부터 시작하는 target 번호
    pub step: usize,
    pub total_targets: usize,
    pub path: String,
    pub outcome: LayerOutcome,
    pub snapshot: Option<LayerSnapshot>,
}

impl LayerProgress {
    pub fn is_replaced(&self) -> bool {
        self.outcome == LayerOutcome::Replaced
    }
}
