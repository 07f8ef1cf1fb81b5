//! 호스트 모델 트리, 경로 연산, 통계

pub mod module;
pub mod path;
pub mod presets;
pub mod stats;


pub use module::{Module, ModuleDict, OpaqueModule};
pub use path::{expand_paths, get_module, get_module_mut, set_module};
pub use presets::{gpt2_like, HostConfig};
pub use stats::{compression_stats, count_parameters, format_number, model_size_mb, CompressionStats};
