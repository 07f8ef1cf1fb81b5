//! TT 레이어 공통 인터페이스
//!
//! 선형/임베딩 변형은 코어 컨테이너와 축약 루틴을 공유하고,
//! 출력 방향(임베딩은 전치)과 순전파 연산만 다르다.

use super::cores::TtCores;
use super::schema::TtSchema;
use crate::core::penalty::{PenaltyConfig, PenaltySlot};
use crate::error::Result;
use candle_core::{Tensor, Var};
use parking_lot::RwLock;

/// 학습 모드, 복원 캐시, 페널티 누산기
#[derive(Debug)]
pub struct LayerState {
    training: bool,
    cache: RwLock<Option<Tensor>>,
    penalty: Option<PenaltySlot>,
}

impl Default for LayerState {
    fn default() -> Self {
        Self {
            training: true,
            cache: RwLock::new(None),
            penalty: None,
        }
    }
}

impl LayerState {
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// 학습 모드로 들어갈 때는 항상 캐시를 버린다
    pub fn set_training(&mut self, training: bool) {
        if training {
            self.invalidate();
        }
        self.training = training;
    }

    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    pub fn has_cached_weight(&self) -> bool {
        self.cache.read().is_some()
    }

    /// 캐시된 가중치 또는 새로 복원한 가중치. 평가 모드에서만 캐시에 저장한다.
    pub fn weight_with<F>(&self, reconstruct: F) -> Result<Tensor>
    where
        F: FnOnce() -> Result<Tensor>,
    {
        if let Some(cached) = self.cache.read().as_ref() {
            return Ok(cached.clone());
        }

        let weight = reconstruct()?;
        if !self.training {
            *self.cache.write() = Some(weight.clone());
        }
        Ok(weight)
    }

    pub fn attach_penalty(&mut self, config: PenaltyConfig) {
        self.penalty = Some(PenaltySlot::new(config));
    }

    pub fn penalty(&self) -> Option<&PenaltySlot> {
        self.penalty.as_ref()
    }

    /// 학습 모드일 때만 페널티를 갱신
    ///
    /// `weight`는 `(out_features, in_features)` 방향이어야 한다.
    pub fn observe_penalty(&self, weight: &Tensor, schema: &TtSchema) {
        if !self.training {
            return;
        }
        if let Some(slot) = &self.penalty {
            slot.observe(weight, schema);
        }
    }
}

/// 재구성 가능한 TT 레이어
pub trait TtLayer {
    fn cores(&self) -> &TtCores;

    fn cores_mut(&mut self) -> &mut TtCores;

    fn state(&self) -> &LayerState;

    fn state_mut(&mut self) -> &mut LayerState;

    /// 축약 결과 `(out_features, in_features)`를 레이어 고유의 가중치 방향으로 바꾼다
    fn orient(&self, out_in: Tensor) -> Result<Tensor>;

    fn schema(&self) -> &TtSchema {
        self.cores().schema()
    }

    /// 밀집 가중치 복원 (항상 코어에서 다시 계산)
    fn reconstruct_weight(&self) -> Result<Tensor> {
        let out_in = self.cores().dense_out_in()?;
        self.orient(out_in)
    }

    /// 평가 모드 캐시를 거치는 가중치
    fn weight(&self) -> Result<Tensor> {
        self.state().weight_with(|| self.reconstruct_weight())
    }

    fn is_training(&self) -> bool {
        self.state().is_training()
    }

    fn set_training(&mut self, training: bool) {
        self.state_mut().set_training(training);
    }

    /// TT-SVD 등으로 얻은 코어 적재. 캐시는 무효화된다.
    fn load_cores(&mut self, cores: &[Tensor]) -> Result<()> {
        self.cores_mut().load_cores(cores)?;
        self.state().invalidate();
        Ok(())
    }

    fn attach_penalty(&mut self, config: PenaltyConfig) {
        self.state_mut().attach_penalty(config);
    }

    fn penalty(&self) -> Option<&PenaltySlot> {
        self.state().penalty()
    }

    /// 학습 가능한 모든 파라미터 (코어 + 편향)
    fn trainable_vars(&self) -> Vec<Var> {
        self.cores().vars().to_vec()
    }

    fn num_parameters(&self) -> usize {
        self.cores().num_parameters()
    }
}
