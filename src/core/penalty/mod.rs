//! 랭크 축소 페널티

pub mod collector;
pub mod rank_penalty;

#[cfg(test)]
mod __tests__;

pub use collector::{attach_penalty, compute_penalty_metrics, PenaltyCollector};
pub use rank_penalty::{rank_penalty, PenaltyConfig, PenaltyKind, PenaltySlot};
