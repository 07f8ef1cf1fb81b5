//! 레시피 사전 검증
//!
//! 모델과 레시피를 읽기만 하고 구조화된 결과를 돌려준다.
//! 치명/비치명 판단은 호출자에게 맡긴다.

use super::config::{Recipe, Target};
use crate::core::math::checked_product;
use crate::model::{expand_paths, get_module, Module};
use serde::Serialize;

/// 임베딩 어휘 크기 허용 오차 (적용 시 자동 조정됨)
pub const EMBEDDING_VOCAB_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct RecipeValidator<'a> {
    model: &'a Module,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl<'a> RecipeValidator<'a> {
    pub fn new(model: &'a Module) -> Self {
        Self {
            model,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn validate(mut self, recipe: &Recipe) -> ValidationReport {
        for (index, target) in recipe.targets.iter().enumerate() {
            self.validate_target(index, target);
        }

        ValidationReport {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn validate_target(&mut self, index: usize, target: &Target) {
        let paths = expand_paths(self.model, &target.path);
        if paths.is_empty() {
            self.errors.push(format!(
                "Target {}: Path '{}' does not match any modules",
                index, target.path
            ));
            return;
        }

        for path in paths {
            match get_module(self.model, &path) {
                Ok(module) => self.validate_module(module, target, &path),
                Err(e) => self.errors.push(format!(
                    "Target {}: Cannot access module at path '{}': {}",
                    index, path, e
                )),
            }
        }
    }

    fn validate_module(&mut self, module: &Module, target: &Target, path: &str) {
        let (expected_in, expected_out, is_embedding) = match module {
            Module::Linear(linear) => {
                let (out, inp) = linear.weight().dims2().unwrap_or((0, 0));
                (inp, out, false)
            }
            Module::Embedding(embedding) => {
                let (vocab, dim) = embedding.embeddings().dims2().unwrap_or((0, 0));
                (vocab, dim, true)
            }
            other => {
                self.warnings.push(format!(
                    "Path '{}': Module type {} may not be supported",
                    path,
                    other.kind()
                ));
                return;
            }
        };

        match checked_product(&target.in_modes) {
            None => self.errors.push(format!(
                "Path '{}': in_modes product overflows: {:?}",
                path, target.in_modes
            )),
            Some(in_product) if is_embedding => {
                let gap = (in_product as f64 - expected_in as f64).abs();
                if gap > expected_in as f64 * EMBEDDING_VOCAB_TOLERANCE {
                    self.warnings.push(format!(
                        "Path '{}': in_modes product {} != num_embeddings {} (will be auto-adjusted)",
                        path, in_product, expected_in
                    ));
                }
            }
            Some(in_product) if in_product != expected_in => self.errors.push(format!(
                "Path '{}': in_modes product {} != in_features {}",
                path, in_product, expected_in
            )),
            Some(_) => {}
        }

        match checked_product(&target.out_modes) {
            None => self.errors.push(format!(
                "Path '{}': out_modes product overflows: {:?}",
                path, target.out_modes
            )),
            Some(out_product) if out_product != expected_out => self.errors.push(format!(
                "Path '{}': out_modes product {} != out_features {}",
                path, out_product, expected_out
            )),
            Some(_) => {}
        }

        if target.in_modes.iter().chain(&target.out_modes).any(|&m| m == 0) {
            self.errors.push(format!(
                "Path '{}': modes must be positive, got in={:?} out={:?}",
                path, target.in_modes, target.out_modes
            ));
        }

        if !is_embedding && target.in_modes.len() != target.out_modes.len() {
            self.errors.push(format!(
                "Path '{}': in_modes length {} != out_modes length {}",
                path,
                target.in_modes.len(),
                target.out_modes.len()
            ));
        }

        let expected_ranks = target.in_modes.len() + 1;
        if target.ranks.len() != expected_ranks {
            self.errors.push(format!(
                "Path '{}': ranks length {} != expected {}",
                path,
                target.ranks.len(),
                expected_ranks
            ));
        }
        if let (Some(first), Some(last)) = (target.ranks.first(), target.ranks.last()) {
            if *first != 1 || *last != 1 {
                self.errors.push(format!(
                    "Path '{}': ranks must start and end with 1, got {} and {}",
                    path, first, last
                ));
            }
        }
        if target.ranks.contains(&0) {
            self.errors.push(format!(
                "Path '{}': ranks must be positive, got {:?}",
                path, target.ranks
            ));
        }

        if !target.decomp.is_supported() {
            self.errors.push(format!(
                "Path '{}': Only 'TT' decomposition is supported, got '{}'",
                path, target.decomp
            ));
        }

        if !target.init.is_known() {
            self.warnings.push(format!(
                "Path '{}': Unknown init type '{}', using 'random'",
                path, target.init
            ));
        }
    }
}

pub fn validate_recipe(model: &Module, recipe: &Recipe) -> ValidationReport {
    RecipeValidator::new(model).validate(recipe)
}
