//! TT 임베딩 레이어
//!
//! in_modes는 어휘, out_modes는 임베딩 차원을 분해한다.
//! 복원 결과는 전치되어 행이 어휘, 열이 임베딩 차원이 된다.

use super::cores::TtCores;
use super::layer::{LayerState, TtLayer};
use super::linear::SeedMode;
use super::schema::TtSchema;
use super::ttsvd::tt_svd;
use crate::error::{Result, TtError};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Embedding, Module};
use rand::Rng;

#[derive(Debug)]
pub struct TtEmbedding {
    cores: TtCores,
    state: LayerState,
}

impl TtEmbedding {
    pub fn new<R: Rng + ?Sized>(schema: TtSchema, device: &Device, rng: &mut R) -> Result<Self> {
        Ok(Self {
            cores: TtCores::random(schema, device, rng)?,
            state: LayerState::default(),
        })
    }

    /// 밀집 `Embedding`(테이블 `(vocab, dim)`)을 대체할 TT 레이어 생성
    ///
    /// `∏ out_modes`는 임베딩 차원과 정확히 같아야 한다. 어휘 쪽은
    /// `∏ in_modes`가 실제 어휘보다 작을 수 있으며, 이때 TT-SVD는
    /// 테이블의 앞쪽 `∏ in_modes`개 행만 사용한다.
    pub fn from_dense<R: Rng + ?Sized>(
        dense: &Embedding,
        schema: TtSchema,
        seed: SeedMode,
        rng: &mut R,
    ) -> Result<Self> {
        let table = dense.embeddings();
        let (vocab, dim) = table.dims2()?;
        if schema.out_features() != dim {
            return Err(TtError::shape_mismatch(
                format!("embedding_dim {}", dim),
                format!("out_modes product {}", schema.out_features()),
            ));
        }
        if schema.in_features() > vocab {
            return Err(TtError::shape_mismatch(
                format!("num_embeddings <= {}", vocab),
                format!("in_modes product {}", schema.in_features()),
            ));
        }

        let mut layer = Self::new(schema, table.device(), rng)?;
        if seed == SeedMode::TtSvd {
            let rows = layer.num_embeddings();
            // (vocab, dim) → (dim, vocab) = (out, in)
            let out_in = table.narrow(0, 0, rows)?.t()?.contiguous()?;
            let cores = tt_svd(&out_in, layer.schema())?;
            layer.load_cores(&cores)?;
        }
        Ok(layer)
    }

    pub fn num_embeddings(&self) -> usize {
        self.schema().in_features()
    }

    pub fn embedding_dim(&self) -> usize {
        self.schema().out_features()
    }

    /// 정수 인덱스 텐서로 행 조회. 범위를 벗어난 인덱스는 밀집 임베딩과 같이 실패한다.
    pub fn forward_tt(&self, ids: &Tensor) -> Result<Tensor> {
        let table = self.weight()?;
        if self.state.is_training() && self.state.penalty().is_some() {
            self.state.observe_penalty(&table.t()?, self.schema());
        }

        let ids_vec = ids.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?;
        let vocab = self.num_embeddings();
        if let Some(&bad) = ids_vec.iter().find(|&&id| id < 0 || id as usize >= vocab) {
            return Err(TtError::lookup(format!(
                "index {} out of range for embedding of size {}",
                bad, vocab
            )));
        }

        Ok(Embedding::new(table, self.embedding_dim()).forward(ids)?)
    }
}

impl TtLayer for TtEmbedding {
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
        Ok(out_in.t()?.contiguous()?)
    }
}

impl Module for TtEmbedding {
    fn forward(&self, ids: &Tensor) -> candle_core::Result<Tensor> {
        self.forward_tt(ids).map_err(candle_core::Error::wrap)
    }
}
