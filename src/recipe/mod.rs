//! 레시피 구성, 검증, 적용

pub mod apply;
pub mod config;
pub mod progress;
pub mod validator;

#[cfg(test)]
mod __tests__;

pub use apply::{
    apply_recipe, apply_recipe_with_progress, attach_recipe_penalties, reconcile_vocab_modes,
    CompressionSummary,
};
pub use config::{load_recipe, save_recipe, Decomposition, InitPolicy, Recipe, Target};
pub use progress::{LayerOutcome, LayerProgress, LayerSnapshot, MAX_SNAPSHOT_VALUES};
pub use validator::{validate_recipe, RecipeValidator, ValidationReport};
