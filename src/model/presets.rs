//! 합성 호스트 모델
//!
//! 체크포인트 로딩 없이 GPT-2 모양의 모듈 트리를 만든다.
//! CLI의 `apply`/`stats`와 테스트가 이 트리를 대상으로 한다.

use super::module::{Module, ModuleDict, OpaqueModule};
use crate::error::Result;
use candle_core::{Device, Tensor};
use candle_nn::{Embedding, Linear};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 합성 GPT-2 구성
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub vocab_size: usize,
    pub n_positions: usize,
    pub n_embd: usize,
    pub n_layer: usize,
    /// 가중치 초기화 시드
    pub seed: u64,
}

impl Default for HostConfig {
    /// GPT-2 small (124M)
    fn default() -> Self {
        Self {
            vocab_size: 50257,
            n_positions: 1024,
            n_embd: 768,
            n_layer: 12,
            seed: 0,
        }
    }
}

impl HostConfig {
    /// 테스트용 소형 구성
    pub fn tiny() -> Self {
        Self {
            vocab_size: 64,
            n_positions: 16,
            n_embd: 16,
            n_layer: 2,
            seed: 0,
        }
    }
}

const INIT_STD: f32 = 0.02;

struct Init<'a> {
    rng: StdRng,
    device: &'a Device,
}

impl Init<'_> {
    /// 표준편차 0.02의 균등분포 (±0.02·√3)
    fn uniform(&mut self, rows: usize, cols: usize) -> Result<Tensor> {
        let bound = INIT_STD * 3f32.sqrt();
        let data: Vec<f32> = (0..rows * cols)
            .map(|_| self.rng.gen_range(-bound..bound))
            .collect();
        Ok(Tensor::from_vec(data, (rows, cols), self.device)?)
    }

    fn linear(&mut self, in_features: usize, out_features: usize, bias: bool) -> Result<Module> {
        let weight = self.uniform(out_features, in_features)?;
        let bias = if bias {
            Some(Tensor::zeros(out_features, candle_core::DType::F32, self.device)?)
        } else {
            None
        };
        Ok(Module::Linear(Linear::new(weight, bias)))
    }

    fn embedding(&mut self, count: usize, dim: usize) -> Result<Module> {
        Ok(Module::Embedding(Embedding::new(self.uniform(count, dim)?, dim)))
    }

    fn layer_norm(&self, dim: usize) -> Result<Module> {
        let gamma = Tensor::ones(dim, candle_core::DType::F32, self.device)?;
        let beta = Tensor::zeros(dim, candle_core::DType::F32, self.device)?;
        Ok(Module::Opaque(OpaqueModule::new("LayerNorm", vec![gamma, beta])))
    }
}

/// `transformer.{wte, wpe, h[*], ln_f}`와 `lm_head`를 갖는 GPT-2 모양 트리
pub fn gpt2_like(config: &HostConfig, device: &Device) -> Result<Module> {
    let mut init = Init {
        rng: StdRng::seed_from_u64(config.seed),
        device,
    };
    let d = config.n_embd;

    let mut blocks = Vec::with_capacity(config.n_layer);
    for _ in 0..config.n_layer {
        let attn = ModuleDict::new()
            .with("c_attn", init.linear(d, 3 * d, true)?)
            .with("c_proj", init.linear(d, d, true)?);
        let mlp = ModuleDict::new()
            .with("c_fc", init.linear(d, 4 * d, true)?)
            .with("c_proj", init.linear(4 * d, d, true)?);
        let block = ModuleDict::new()
            .with("ln_1", init.layer_norm(d)?)
            .with("attn", attn.into())
            .with("ln_2", init.layer_norm(d)?)
            .with("mlp", mlp.into());
        blocks.push(block.into());
    }

    let transformer = ModuleDict::new()
        .with("wte", init.embedding(config.vocab_size, d)?)
        .with("wpe", init.embedding(config.n_positions, d)?)
        .with("h", Module::Sequential(blocks))
        .with("ln_f", init.layer_norm(d)?);

    let root = ModuleDict::new()
        .with("transformer", transformer.into())
        .with("lm_head", init.linear(d, config.vocab_size, false)?);
    Ok(root.into())
}
