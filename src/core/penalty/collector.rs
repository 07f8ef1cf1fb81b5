//! 페널티 부착과 수집
//!
//! 레이어별 누산기는 순전파 때 채워지고, 학습 스텝마다 수집기가 한 번 읽어
//! 주 손실에 더한 뒤 0으로 되돌린다.

use super::rank_penalty::PenaltyConfig;
use crate::error::Result;
use crate::model::Module;
use candle_core::Tensor;
use std::collections::BTreeMap;

/// TT 레이어에 페널티 누산기 부착. 복원 연산이 없는 모듈이면 `false`.
pub fn attach_penalty(module: &mut Module, config: PenaltyConfig) -> bool {
    match module.as_tt_layer_mut() {
        Some(layer) => {
            layer.attach_penalty(config);
            true
        }
        None => false,
    }
}

/// 모델 전체의 대기 페널티를 모아 손실에 더하는 수집기
pub struct PenaltyCollector;

impl PenaltyCollector {
    /// 모든 대기 페널티의 합. 읽은 누산기는 0으로 초기화된다.
    pub fn collect(model: &Module) -> f64 {
        model
            .named_modules()
            .into_iter()
            .filter_map(|(_, m)| m.as_tt_layer())
            .filter_map(|layer| layer.penalty())
            .map(|slot| slot.take())
            .sum()
    }

    /// `loss + collect(model)`
    ///
    /// 페널티는 관찰값이므로 기울기를 만들지 않는다.
    pub fn add_to_loss(model: &Module, loss: &Tensor) -> Result<Tensor> {
        let extra = Self::collect(model);
        Ok(loss.affine(1.0, extra)?)
    }
}

/// 모듈별 대기 페널티 (읽기만 하고 초기화하지 않음)
///
/// 키: `<경로>_penalty`, `total_penalty`, `num_penalty_modules`
pub fn compute_penalty_metrics(model: &Module) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();
    let mut total = 0.0;
    let mut count = 0usize;

    for (path, module) in model.named_modules() {
        let Some(slot) = module.as_tt_layer().and_then(|l| l.penalty()) else {
            continue;
        };
        let value = slot.pending();
        metrics.insert(format!("{}_penalty", path), value);
        total += value;
        count += 1;
    }

    metrics.insert("total_penalty".to_string(), total);
    metrics.insert("num_penalty_modules".to_string(), count as f64);
    metrics
}
