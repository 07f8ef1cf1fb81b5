//! 파라미터 통계

use super::module::Module;
use serde::Serialize;

/// 모델 전체의 TT/밀집 파라미터 분포
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionStats {
    pub total_params: usize,
    pub tt_params: usize,
    pub dense_params: usize,
    /// dense / tt (TT 레이어가 없으면 0)
    pub compression_ratio: f64,
}

pub fn count_parameters(model: &Module) -> usize {
    model.num_parameters()
}

/// 남아 있는 밀집 선형/임베딩과 TT 레이어의 파라미터를 따로 센다
pub fn compression_stats(model: &Module) -> CompressionStats {
    let mut tt_params = 0;
    let mut dense_params = 0;
    for (_, module) in model.named_modules() {
        match module {
            Module::TtLinear(_) | Module::TtEmbedding(_) => tt_params += module.num_parameters(),
            Module::Linear(_) | Module::Embedding(_) => dense_params += module.num_parameters(),
            _ => {}
        }
    }

    CompressionStats {
        total_params: model.num_parameters(),
        tt_params,
        dense_params,
        compression_ratio: ratio(dense_params, tt_params),
    }
}

/// `numerator / denominator`, 분모가 0이면 0
pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// f32 기준 모델 크기 (MB)
pub fn model_size_mb(model: &Module) -> f64 {
    (model.num_parameters() * std::mem::size_of::<f32>()) as f64 / (1024.0 * 1024.0)
}

/// K/M/B 접미사 표기
pub fn format_number(n: usize) -> String {
    let value = n as f64;
    if n >= 1_000_000_000 {
        format!("{:.2}B", value / 1e9)
    } else if n >= 1_000_000 {
        format!("{:.2}M", value / 1e6)
    } else if n >= 1_000 {
        format!("{:.2}K", value / 1e3)
    } else {
        n.to_string()
    }
}
