//! TT 선형 레이어: y = x · Wᵗ + b

use super::cores::TtCores;
use super::layer::{LayerState, TtLayer};
use super::schema::TtSchema;
use super::ttsvd::tt_svd;
use crate::error::{Result, TtError};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Linear, Module};
use rand::Rng;

/// 밀집 레이어로부터 TT 레이어를 만들 때의 초기화 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// 기본 Xavier-uniform 초기화 그대로
    Random,
    /// 편향만 복사 (가중치는 무작위)
    Copy,
    /// 밀집 가중치의 TT-SVD로 코어 시드
    TtSvd,
}

#[derive(Debug)]
pub struct TtLinear {
    cores: TtCores,
    bias: Option<Var>,
    state: LayerState,
}

impl TtLinear {
    pub fn new<R: Rng + ?Sized>(
        schema: TtSchema,
        with_bias: bool,
        device: &Device,
        rng: &mut R,
    ) -> Result<Self> {
        let bias = if with_bias {
            Some(Var::zeros(schema.out_features(), DType::F32, device)?)
        } else {
            None
        };
        let cores = TtCores::random(schema, device, rng)?;

        Ok(Self {
            cores,
            bias,
            state: LayerState::default(),
        })
    }

    /// 밀집 `Linear`(가중치 `(out, in)`)를 대체할 TT 레이어 생성
    pub fn from_dense<R: Rng + ?Sized>(
        dense: &Linear,
        schema: TtSchema,
        seed: SeedMode,
        rng: &mut R,
    ) -> Result<Self> {
        let weight = dense.weight();
        let (out_features, in_features) = weight.dims2()?;
        if (schema.out_features(), schema.in_features()) != (out_features, in_features) {
            return Err(TtError::shape_mismatch(
                format!("Linear({}, {})", in_features, out_features),
                format!(
                    "modes product in={} out={}",
                    schema.in_features(),
                    schema.out_features()
                ),
            ));
        }

        let mut layer = Self::new(schema, dense.bias().is_some(), weight.device(), rng)?;
        match seed {
            SeedMode::Random => {}
            SeedMode::Copy => layer.copy_bias_from(dense)?,
            SeedMode::TtSvd => {
                let cores = tt_svd(weight, layer.schema())?;
                layer.load_cores(&cores)?;
                layer.copy_bias_from(dense)?;
            }
        }
        Ok(layer)
    }

    /// 밀집 레이어의 편향만 복사
    pub fn copy_bias_from(&mut self, dense: &Linear) -> Result<()> {
        if let (Some(src), Some(dst)) = (dense.bias(), &self.bias) {
            dst.set(&src.to_dtype(dst.dtype())?)?;
            self.state.invalidate();
        }
        Ok(())
    }

    pub fn bias(&self) -> Option<&Var> {
        self.bias.as_ref()
    }

    pub fn in_features(&self) -> usize {
        self.schema().in_features()
    }

    pub fn out_features(&self) -> usize {
        self.schema().out_features()
    }

    /// 순전파. 입력 마지막 축은 `in_features`.
    pub fn forward_tt(&self, xs: &Tensor) -> Result<Tensor> {
        let weight = self.weight()?;
        self.state.observe_penalty(&weight, self.schema());

        let bias = self.bias.as_ref().map(|b| b.as_tensor().clone());
        Ok(Linear::new(weight, bias).forward(xs)?)
    }
}

impl TtLayer for TtLinear {
    fn cores(&self) -> &TtCores {
        &self.cores
    }

    fn cores_mut(&mut self) -> &mut TtCores {
        &mut self.cores
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }

    fn orient(&self, out_in: Tensor) -> Result<Tensor> {
        Ok(out_in)
    }

    fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = self.cores.vars().to_vec();
        vars.extend(self.bias.iter().cloned());
        vars
    }

    fn num_parameters(&self) -> usize {
        self.cores.num_parameters() + self.bias.as_ref().map_or(0, |b| b.elem_count())
    }
}

impl Module for TtLinear {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.forward_tt(xs).map_err(candle_core::Error::wrap)
    }
}
