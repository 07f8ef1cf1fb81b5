//! 압축 레시피
//!
//! 어떤 서브모듈을 어떤 모드/랭크로 분해할지 선언하는 구성.
//! YAML 파일이 기본 형식이고, 서비스 호출자를 위해 JSON도 읽는다.

use crate::core::penalty::PenaltyConfig;
use crate::core::tt::SeedMode;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 분해 방식. 현재는 TT만 지원한다.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Decomposition {
    #[default]
    Tt,
    Other(String),
}

impl Decomposition {
    pub fn is_supported(&self) -> bool {
        matches!(self, Decomposition::Tt)
    }
}

impl From<String> for Decomposition {
    fn from(name: String) -> Self {
        if name.eq_ignore_ascii_case("tt") {
            Decomposition::Tt
        } else {
            Decomposition::Other(name)
        }
    }
}

impl From<Decomposition> for String {
    fn from(decomp: Decomposition) -> Self {
        decomp.to_string()
    }
}

impl fmt::Display for Decomposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decomposition::Tt => write!(f, "TT"),
            Decomposition::Other(name) => write!(f, "{}", name),
        }
    }
}

/// 코어 초기화 정책
///
/// 알 수 없는 이름은 검증기가 경고할 수 있도록 그대로 보존하고,
/// 적용 시에는 `random`으로 취급한다.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InitPolicy {
    #[default]
    Random,
    TtSvd,
    Copy,
    Unknown(String),
}

impl InitPolicy {
    pub fn is_known(&self) -> bool {
        !matches!(self, InitPolicy::Unknown(_))
    }

    pub fn seed_mode(&self) -> SeedMode {
        match self {
            InitPolicy::TtSvd => SeedMode::TtSvd,
            InitPolicy::Copy => SeedMode::Copy,
            InitPolicy::Random | InitPolicy::Unknown(_) => SeedMode::Random,
        }
    }
}

impl From<String> for InitPolicy {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "random" => InitPolicy::Random,
            "ttsvd" | "tt-svd" | "tt_svd" => InitPolicy::TtSvd,
            "copy" => InitPolicy::Copy,
            _ => InitPolicy::Unknown(name),
        }
    }
}

impl From<InitPolicy> for String {
    fn from(init: InitPolicy) -> Self {
        init.to_string()
    }
}

impl fmt::Display for InitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitPolicy::Random => write!(f, "random"),
            InitPolicy::TtSvd => write!(f, "ttsvd"),
            InitPolicy::Copy => write!(f, "copy"),
            InitPolicy::Unknown(name) => write!(f, "{}", name),
        }
    }
}

/// 분해 대상 하나
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// 점 경로, `[*]` 와일드카드 허용
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub decomp: Decomposition,
    #[serde(default)]
    pub in_modes: Vec<usize>,
    #[serde(default)]
    pub out_modes: Vec<usize>,
    #[serde(default)]
    pub ranks: Vec<usize>,
    #[serde(default)]
    pub init: InitPolicy,
    /// 없으면 키 자체를 쓰지 않는다
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty: Option<PenaltyConfig>,
}

impl Target {
    pub fn new(
        path: impl Into<String>,
        in_modes: Vec<usize>,
        out_modes: Vec<usize>,
        ranks: Vec<usize>,
    ) -> Self {
        Self {
            path: path.into(),
            decomp: Decomposition::Tt,
            in_modes,
            out_modes,
            ranks,
            init: InitPolicy::Random,
            penalty: None,
        }
    }

    pub fn with_init(mut self, init: InitPolicy) -> Self {
        self.init = init;
        self
    }

    pub fn with_penalty(mut self, penalty: PenaltyConfig) -> Self {
        self.penalty = Some(penalty);
        self
    }
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            model: String::new(),
            seed: default_seed(),
            budget: String::new(),
            targets: Vec::new(),
        }
    }
}

impl Recipe {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// GPT-2 small을 위한 예시 레시피 (CLI `template`)
    pub fn gpt2_template() -> Self {
        Recipe::new("gpt2")
            .with_target(
                Target::new(
                    "transformer.h[*].mlp.c_fc",
                    vec![4, 4, 4, 12],
                    vec![4, 4, 8, 24],
                    vec![1, 8, 8, 8, 1],
                )
                .with_init(InitPolicy::TtSvd)
                .with_penalty(PenaltyConfig::default()),
            )
            .with_target(
                Target::new(
                    "transformer.h[*].mlp.c_proj",
                    vec![4, 4, 8, 24],
                    vec![4, 4, 4, 12],
                    vec![1, 8, 8, 8, 1],
                )
                .with_init(InitPolicy::TtSvd),
            )
            .with_target(Target::new(
                "transformer.h[*].attn.c_attn",
                vec![4, 4, 4, 12],
                vec![4, 4, 12, 12],
                vec![1, 16, 16, 16, 1],
            ))
    }
}

/// YAML 레시피 파일 읽기
pub fn load_recipe(path: impl AsRef<Path>) -> Result<Recipe> {
    let text = std::fs::read_to_string(path)?;
    Recipe::from_yaml_str(&text)
}

/// YAML 레시피 파일 쓰기
pub fn save_recipe(recipe: &Recipe, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, recipe.to_yaml_string()?)?;
    Ok(())
}
