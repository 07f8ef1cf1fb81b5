//! 호스트 모델 그래프
//!
//! 경로로만 읽고 쓰는 불투명한 모듈 트리. 시퀀스 자식은 위치로,
//! 사전 자식은 이름으로 주소를 매긴다.

use crate::core::tt::{TtEmbedding, TtLayer, TtLinear};
use candle_core::Tensor;
use candle_nn::{Embedding, Linear};

/// 이름 순서를 보존하는 자식 모듈 사전
#[derive(Debug, Default)]
pub struct ModuleDict {
    entries: Vec<(String, Module)>,
}

impl ModuleDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 스타일 삽입
    pub fn with(mut self, name: impl Into<String>, module: Module) -> Self {
        self.insert(name, module);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    /// 같은 이름이 있으면 제자리에서 교체하고 이전 모듈을 돌려준다
    pub fn insert(&mut self, name: impl Into<String>, module: Module) -> Option<Module> {
        let name = name.into();
        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(pos) => Some(std::mem::replace(&mut self.entries[pos].1, module)),
            None => {
                self.entries.push((name, module));
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Module)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Module)> {
        self.entries.iter_mut().map(|(n, m)| (n.as_str(), m))
    }
}

/// TT 변환 대상이 아닌 레이어 (LayerNorm 등). 파라미터 개수만 의미가 있다.
#[derive(Debug, Clone)]
pub struct OpaqueModule {
    pub kind: String,
    pub params: Vec<Tensor>,
}

impl OpaqueModule {
    pub fn new(kind: impl Into<String>, params: Vec<Tensor>) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

#[derive(Debug)]
pub enum Module {
    Linear(Linear),
    Embedding(Embedding),
    TtLinear(TtLinear),
    TtEmbedding(TtEmbedding),
    Sequential(Vec<Module>),
    Dict(ModuleDict),
    Opaque(OpaqueModule),
}

impl Module {
    pub fn kind(&self) -> &str {
        match self {
            Module::Linear(_) => "Linear",
            Module::Embedding(_) => "Embedding",
            Module::TtLinear(_) => "TTLinear",
            Module::TtEmbedding(_) => "TTEmbedding",
            Module::Sequential(_) => "Sequential",
            Module::Dict(_) => "ModuleDict",
            Module::Opaque(op) => &op.kind,
        }
    }

    /// TT 변환을 지원하는 밀집 레이어인지
    pub fn is_dense_target(&self) -> bool {
        matches!(self, Module::Linear(_) | Module::Embedding(_))
    }

    /// 자기 자신을 포함한 하위 트리 전체의 파라미터 수
    pub fn num_parameters(&self) -> usize {
        match self {
            Module::Linear(l) => {
                l.weight().elem_count() + l.bias().map_or(0, |b| b.elem_count())
            }
            Module::Embedding(e) => e.embeddings().elem_count(),
            Module::TtLinear(tt) => tt.num_parameters(),
            Module::TtEmbedding(tt) => tt.num_parameters(),
            Module::Sequential(items) => items.iter().map(Module::num_parameters).sum(),
            Module::Dict(dict) => dict.iter().map(|(_, m)| m.num_parameters()).sum(),
            Module::Opaque(op) => op.params.iter().map(|t| t.elem_count()).sum(),
        }
    }

    /// 직계 자식과 그 경로 조각
    pub fn children(&self) -> Vec<(String, &Module)> {
        match self {
            Module::Sequential(items) => items
                .iter()
                .enumerate()
                .map(|(i, m)| (i.to_string(), m))
                .collect(),
            Module::Dict(dict) => dict.iter().map(|(n, m)| (n.to_string(), m)).collect(),
            _ => Vec::new(),
        }
    }

    /// 전위 순회한 `(경로, 모듈)` 목록. 루트의 경로는 빈 문자열.
    pub fn named_modules(&self) -> Vec<(String, &Module)> {
        let mut out = Vec::new();
        self.collect_named(String::new(), &mut out);
        out
    }

    fn collect_named<'a>(&'a self, path: String, out: &mut Vec<(String, &'a Module)>) {
        let children = self.children();
        out.push((path.clone(), self));
        for (name, child) in children {
            let child_path = if path.is_empty() {
                name
            } else {
                format!("{}.{}", path, name)
            };
            child.collect_named(child_path, out);
        }
    }

    /// 하위 모든 TT 레이어의 학습/평가 모드 전환
    pub fn set_training(&mut self, training: bool) {
        match self {
            Module::TtLinear(tt) => tt.set_training(training),
            Module::TtEmbedding(tt) => tt.set_training(training),
            Module::Sequential(items) => items.iter_mut().for_each(|m| m.set_training(training)),
            Module::Dict(dict) => dict.iter_mut().for_each(|(_, m)| m.set_training(training)),
            _ => {}
        }
    }

    pub fn as_tt_layer(&self) -> Option<&dyn TtLayer> {
        match self {
            Module::TtLinear(tt) => Some(tt as &dyn TtLayer),
            Module::TtEmbedding(tt) => Some(tt as &dyn TtLayer),
            _ => None,
        }
    }

    pub fn as_tt_layer_mut(&mut self) -> Option<&mut dyn TtLayer> {
        match self {
            Module::TtLinear(tt) => Some(tt as &mut dyn TtLayer),
            Module::TtEmbedding(tt) => Some(tt as &mut dyn TtLayer),
            _ => None,
        }
    }
}

impl From<Linear> for Module {
    fn from(layer: Linear) -> Self {
        Module::Linear(layer)
    }
}

impl From<Embedding> for Module {
    fn from(layer: Embedding) -> Self {
        Module::Embedding(layer)
    }
}

impl From<TtLinear> for Module {
    fn from(layer: TtLinear) -> Self {
        Module::TtLinear(layer)
    }
}

impl From<TtEmbedding> for Module {
    fn from(layer: TtEmbedding) -> Self {
        Module::TtEmbedding(layer)
    }
}

impl From<ModuleDict> for Module {
    fn from(dict: ModuleDict) -> Self {
        Module::Dict(dict)
    }
}
