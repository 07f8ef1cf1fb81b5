//! 점 경로 탐색과 그래프 수정
//!
//! `transformer.h.0.mlp.c_fc` 처럼 숫자 조각은 시퀀스 인덱스,
//! 나머지는 사전 자식 이름이다. `[*]`는 시퀀스 길이만큼 펼친다.

use super::module::Module;
use crate::error::{Result, TtError};

const WILDCARD: &str = "[*]";

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

fn is_index(segment: &str) -> bool {
    segment.bytes().all(|b| b.is_ascii_digit())
}

fn child<'a>(module: &'a Module, segment: &str) -> Result<&'a Module> {
    match module {
        Module::Sequential(items) if is_index(segment) => {
            let index: usize = segment
                .parse()
                .map_err(|_| TtError::lookup(format!("잘못된 인덱스 '{}'", segment)))?;
            items.get(index).ok_or_else(|| {
                TtError::lookup(format!(
                    "index {} out of range for Sequential of length {}",
                    index,
                    items.len()
                ))
            })
        }
        Module::Dict(dict) if !is_index(segment) => dict
            .get(segment)
            .ok_or_else(|| TtError::lookup(format!("'{}' has no attribute '{}'", module.kind(), segment))),
        other => Err(TtError::lookup(format!(
            "'{}' is not addressable by '{}'",
            other.kind(),
            segment
        ))),
    }
}

fn child_mut<'a>(module: &'a mut Module, segment: &str) -> Result<&'a mut Module> {
    let kind = module.kind().to_string();
    match module {
        Module::Sequential(items) if is_index(segment) => {
            let len = items.len();
            let index: usize = segment
                .parse()
                .map_err(|_| TtError::lookup(format!("잘못된 인덱스 '{}'", segment)))?;
            items.get_mut(index).ok_or_else(|| {
                TtError::lookup(format!(
                    "index {} out of range for Sequential of length {}",
                    index, len
                ))
            })
        }
        Module::Dict(dict) if !is_index(segment) => dict
            .get_mut(segment)
            .ok_or_else(|| TtError::lookup(format!("'{}' has no attribute '{}'", kind, segment))),
        _ => Err(TtError::lookup(format!(
            "'{}' is not addressable by '{}'",
            kind, segment
        ))),
    }
}

/// 경로의 모듈 조회. 빈 경로는 루트 자신.
pub fn get_module<'a>(root: &'a Module, path: &str) -> Result<&'a Module> {
    segments(path).try_fold(root, child)
}

pub fn get_module_mut<'a>(root: &'a mut Module, path: &str) -> Result<&'a mut Module> {
    segments(path).try_fold(root, child_mut)
}

/// 마지막 조각의 부모에서 자식을 교체
///
/// 시퀀스는 범위 안의 인덱스만 교체할 수 있고, 사전은 없는 이름이면 새로 추가한다.
/// 교체된 이전 모듈을 돌려준다.
pub fn set_module(root: &mut Module, path: &str, module: Module) -> Result<Option<Module>> {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    };
    if leaf.is_empty() {
        return Err(TtError::lookup(format!("빈 경로 조각: '{}'", path)));
    }

    let parent = get_module_mut(root, parent_path)?;
    let kind = parent.kind().to_string();
    match parent {
        Module::Sequential(items) if is_index(leaf) => {
            let len = items.len();
            let slot = leaf
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| {
                    TtError::lookup(format!(
                        "index {} out of range for Sequential of length {}",
                        leaf, len
                    ))
                })?;
            Ok(Some(std::mem::replace(slot, module)))
        }
        Module::Dict(dict) if !is_index(leaf) => Ok(dict.insert(leaf, module)),
        _ => Err(TtError::lookup(format!(
            "cannot set '{}' on '{}'",
            leaf, kind
        ))),
    }
}

/// `[*]` 와일드카드를 실제 시퀀스 인덱스로 펼친다
///
/// 와일드카드가 없으면 패턴 그대로(존재 여부는 확인하지 않음) 돌려준다.
/// 접두사가 없거나 시퀀스가 아니면 빈 목록이다.
pub fn expand_paths(root: &Module, pattern: &str) -> Vec<String> {
    let Some((prefix, suffix)) = pattern.split_once(WILDCARD) else {
        return vec![pattern.to_string()];
    };
    let prefix = prefix.trim_end_matches('.');
    let suffix = suffix.trim_start_matches('.');

    let len = match get_module(root, prefix) {
        Ok(Module::Sequential(items)) => items.len(),
        _ => return Vec::new(),
    };

    let mut out = Vec::new();
    for i in 0..len {
        let index = i.to_string();
        let parts: Vec<&str> = [prefix, index.as_str(), suffix]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        let concrete = parts.join(".");
        if concrete.contains(WILDCARD) {
            out.extend(expand_paths(root, &concrete));
        } else {
            out.push(concrete);
        }
    }
    out
}
