//! 레시피 적용
//!
//! target 순서대로 경로를 펼쳐 밀집 레이어를 TT 레이어로 교체한다.
//! 경로 하나의 실패는 요약의 에러 목록에 기록하고 다음으로 넘어간다.

use super::config::{Recipe, Target};
use super::progress::{LayerOutcome, LayerProgress, LayerSnapshot};
use crate::core::math::checked_product;
use crate::core::penalty::attach_penalty;
use crate::core::tt::{TtEmbedding, TtLinear, TtSchema};
use crate::error::{Result, TtError};
use crate::model::stats::ratio;
use crate::model::{count_parameters, expand_paths, get_module, get_module_mut, set_module, Module};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompressionSummary {
    pub replaced: Vec<String>,
    pub errors: Vec<String>,
    /// 적용 전 모델 전체 파라미터 수
    pub dense_params: usize,
    /// 적용 후 모델 전체 파라미터 수
    pub tt_params: usize,
    /// dense / tt, tt가 0이면 0
    pub compression_ratio: f64,
}

/// 임베딩 어휘 쪽 모드를 실제 어휘 크기에 맞춘다
///
/// - 곱이 부족하면 `in_modes` 길이가 `out_len`이 될 때까지 1을 덧붙인다
/// - 곱이 넘치면 앞에서부터 누적 곱이 어휘를 넘지 않는 모드만 남기고
///   `out_len`까지 1로 채운다
///
/// 결과의 곱은 항상 어휘 크기 이하이며 out_modes와 ranks는 건드리지 않는다.
pub fn reconcile_vocab_modes(in_modes: &[usize], out_len: usize, vocab: usize) -> Vec<usize> {
    let current = checked_product(in_modes);
    if current == Some(vocab) {
        return in_modes.to_vec();
    }

    let mut adjusted = if current.is_some_and(|c| c < vocab) {
        in_modes.to_vec()
    } else {
        let mut kept = Vec::with_capacity(in_modes.len());
        let mut running = 1usize;
        for &m in in_modes {
            match running.checked_mul(m) {
                Some(next) if next <= vocab => {
                    kept.push(m);
                    running = next;
                }
                _ => break,
            }
        }
        kept
    };
    while adjusted.len() < out_len {
        adjusted.push(1);
    }
    adjusted
}

fn build_tt_module(dense: &Module, target: &Target, rng: &mut StdRng) -> Result<Module> {
    if !target.decomp.is_supported() {
        return Err(TtError::invalid_config(format!(
            "Only TT is supported, got {}",
            target.decomp
        )));
    }
    let seed = target.init.seed_mode();

    match dense {
        Module::Linear(linear) => {
            let schema = TtSchema::new(
                target.in_modes.clone(),
                target.out_modes.clone(),
                target.ranks.clone(),
            )?;
            Ok(TtLinear::from_dense(linear, schema, seed, rng)?.into())
        }
        Module::Embedding(embedding) => {
            let (vocab, _) = embedding.embeddings().dims2()?;
            let in_modes = reconcile_vocab_modes(&target.in_modes, target.out_modes.len(), vocab);
            if in_modes != target.in_modes {
                warn!(
                    "임베딩 in_modes 자동 조정: {:?} → {:?} (어휘 {})",
                    target.in_modes, in_modes, vocab
                );
            }
            let schema = TtSchema::new(in_modes, target.out_modes.clone(), target.ranks.clone())?;
            Ok(TtEmbedding::from_dense(embedding, schema, seed, rng)?.into())
        }
        other => Err(TtError::unsupported(format!(
            "Unsupported module type {} for TT conversion",
            other.kind()
        ))),
    }
}

fn replace_path(
    model: &mut Module,
    path: &str,
    target: &Target,
    rng: &mut StdRng,
) -> Result<Option<LayerSnapshot>> {
    let dense = get_module(model, path)?;
    let dense_params = dense.num_parameters();
    let replacement = build_tt_module(dense, target, rng)?;

    let snapshot = match replacement.as_tt_layer() {
        Some(layer) => Some(LayerSnapshot::capture(layer)?),
        None => None,
    };
    let tt_params = replacement.num_parameters();
    set_module(model, path, replacement)?;

    info!(
        "{} → TT ({} → {} params, init={})",
        path, dense_params, tt_params, target.init
    );
    Ok(snapshot)
}

/// 레시피 적용 (진행 이벤트 없음)
pub fn apply_recipe(model: &mut Module, recipe: &Recipe) -> CompressionSummary {
    apply_recipe_with_progress(model, recipe, |_| {})
}

/// 레시피 적용, 경로마다 `on_layer` 호출
///
/// 초기화 난수는 `recipe.seed`로 고정된다.
pub fn apply_recipe_with_progress<F>(
    model: &mut Module,
    recipe: &Recipe,
    mut on_layer: F,
) -> CompressionSummary
where
    F: FnMut(&LayerProgress),
{
    let mut rng = StdRng::seed_from_u64(recipe.seed);
    let total_targets = recipe.targets.len();
    let mut summary = CompressionSummary {
        dense_params: count_parameters(model),
        ..CompressionSummary::default()
    };

    for (index, target) in recipe.targets.iter().enumerate() {
        let step = index + 1;
        let paths = expand_paths(model, &target.path);
        if paths.is_empty() {
            let error = format!("No modules found for path: {}", target.path);
            warn!("{}", error);
            on_layer(&LayerProgress {
                step,
                total_targets,
                path: target.path.clone(),
                outcome: LayerOutcome::Failed {
                    error: error.clone(),
                },
                snapshot: None,
            });
            summary.errors.push(error);
            continue;
        }

        for path in paths {
            let (outcome, snapshot) = match replace_path(model, &path, target, &mut rng) {
                Ok(snapshot) => {
                    summary.replaced.push(path.clone());
                    (LayerOutcome::Replaced, snapshot)
                }
                Err(e) => {
                    let error = format!("Error replacing {}: {}", path, e);
                    warn!("{}", error);
                    summary.errors.push(error.clone());
                    (LayerOutcome::Failed { error }, None)
                }
            };
            on_layer(&LayerProgress {
                step,
                total_targets,
                path,
                outcome,
                snapshot,
            });
        }
    }

    summary.tt_params = count_parameters(model);
    summary.compression_ratio = ratio(summary.dense_params, summary.tt_params);
    summary
}

/// penalty가 있는 target의 TT 레이어에 누산기를 붙인다
///
/// 찾을 수 없는 경로나 TT가 아닌 모듈은 조용히 건너뛴다. 부착한 개수를 돌려준다.
pub fn attach_recipe_penalties(model: &mut Module, recipe: &Recipe) -> usize {
    let mut attached = 0;
    for target in &recipe.targets {
        let Some(config) = &target.penalty else {
            continue;
        };
        for path in expand_paths(model, &target.path) {
            if let Ok(module) = get_module_mut(model, &path) {
                if attach_penalty(module, config.clone()) {
                    attached += 1;
                }
            }
        }
    }
    attached
}
