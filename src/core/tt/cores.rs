//! TT 코어 컨테이너
//!
//! 하나의 분해된 가중치를 이루는 4차원 코어 `(r_left, out_mode, in_mode, r_right)`들을
//! candle `Var`로 소유한다. 선형/임베딩 두 변형이 이 컨테이너와 축약 루틴을 공유한다.

use super::schema::TtSchema;
use crate::core::math::{contract, ContractionPlan};
use crate::error::{Result, TtError};
use candle_core::{DType, Device, Tensor, Var};
use rand::Rng;
use serde::Serialize;

/// 코어 하나의 요약 (진행 이벤트/시각화용)
#[derive(Debug, Clone, Serialize)]
pub struct CoreSnapshot {
    pub core_index: usize,
    pub core_shape: [usize; 4],
    pub rank_left: usize,
    pub rank_right: usize,
    pub out_mode: usize,
    pub in_mode: usize,
    /// 앞쪽 최대 `max_values`개의 값
    pub core_values: Vec<f32>,
}

#[derive(Debug)]
pub struct TtCores {
    schema: TtSchema,
    cores: Vec<Var>,
    device: Device,
}

impl TtCores {
    /// Xavier-uniform 초기화된 코어 생성
    ///
    /// 각 코어를 `(r_left, out·in·r_right)` 행렬로 보고
    /// `bound = sqrt(6 / (fan_in + fan_out))` 균등분포에서 샘플링한다.
    pub fn random<R: Rng + ?Sized>(schema: TtSchema, device: &Device, rng: &mut R) -> Result<Self> {
        let mut cores = Vec::with_capacity(schema.depth());
        for k in 0..schema.depth() {
            let (r_left, m, n, r_right) = schema.core_shape(k);
            let fan_out = r_left;
            let fan_in = m * n * r_right;
            let bound = (6.0 / (fan_in + fan_out) as f64).sqrt() as f32;

            let data: Vec<f32> = (0..fan_out * fan_in)
                .map(|_| rng.gen_range(-bound..=bound))
                .collect();
            let tensor = Tensor::from_vec(data, (r_left, m, n, r_right), device)?;
            cores.push(Var::from_tensor(&tensor)?);
        }

        Ok(Self {
            schema,
            cores,
            device: device.clone(),
        })
    }

    pub fn schema(&self) -> &TtSchema {
        &self.schema
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// 학습 가능한 코어 파라미터
    pub fn vars(&self) -> &[Var] {
        &self.cores
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn num_parameters(&self) -> usize {
        self.cores.iter().map(|c| c.elem_count()).sum()
    }

    /// 모든 코어를 축약해 `(m1..md, n1..nd)` 텐서를 만든다
    pub fn contract(&self) -> Result<Tensor> {
        if self.cores.is_empty() {
            return Err(TtError::invalid_config(
                "코어가 없는 TT 레이어(d = 0)는 복원할 수 없음",
            ));
        }

        let plan = ContractionPlan::tensor_train(self.cores.len());
        let operands: Vec<&Tensor> = self.cores.iter().map(|c| c.as_tensor()).collect();
        contract(&plan, &operands)
    }

    /// `(out_features, in_features)` 밀집 행렬로 복원
    pub fn dense_out_in(&self) -> Result<Tensor> {
        let full = self.contract()?;
        Ok(full.reshape((self.schema.out_features(), self.schema.in_features()))?)
    }

    /// 외부에서 계산된 코어(TT-SVD 등)를 복사해 넣는다
    pub fn load_cores(&mut self, cores: &[Tensor]) -> Result<()> {
        if cores.len() != self.cores.len() {
            return Err(TtError::shape_mismatch(
                format!("{} cores", self.cores.len()),
                format!("{} cores", cores.len()),
            ));
        }

        for (k, (var, src)) in self.cores.iter().zip(cores).enumerate() {
            let (r0, m, n, r1) = self.schema.core_shape(k);
            if src.dims() != [r0, m, n, r1].as_slice() {
                return Err(TtError::shape_mismatch(
                    format!("core {} ({}, {}, {}, {})", k, r0, m, n, r1),
                    format!("{:?}", src.dims()),
                ));
            }
            let src = src.to_dtype(var.dtype())?.to_device(&self.device)?;
            var.set(&src)?;
        }
        Ok(())
    }

    pub fn snapshot(&self, max_values: usize) -> Result<Vec<CoreSnapshot>> {
        self.cores
            .iter()
            .enumerate()
            .map(|(k, core)| {
                let (r0, m, n, r1) = self.schema.core_shape(k);
                let mut values = core
                    .as_tensor()
                    .detach()
                    .to_dtype(DType::F32)?
                    .flatten_all()?
                    .to_vec1::<f32>()?;
                values.truncate(max_values);

                Ok(CoreSnapshot {
                    core_index: k,
                    core_shape: [r0, m, n, r1],
                    rank_left: r0,
                    rank_right: r1,
                    out_mode: m,
                    in_mode: n,
                    core_values: values,
                })
            })
            .collect()
    }
}
