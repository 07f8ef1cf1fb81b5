//! 일반화된 다중 텐서 축약 (Einstein summation)
//!
//! 축약식은 코어 개수에 따라 런타임에 생성되므로 고정 문자열 대신
//! 라벨 목록(`ContractionPlan`)으로 표현하고, 쌍 단위 batched matmul로 접어 나간다.
//! 모든 연산이 candle 연산이므로 역전파가 그대로 흐른다.

use crate::error::{Result, TtError};
use candle_core::Tensor;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// 축약 인덱스 라벨
pub type Label = usize;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 피연산자별 인덱스 라벨과 출력 라벨 목록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionPlan {
    pub operands: Vec<Vec<Label>>,
    pub output: Vec<Label>,
}

impl ContractionPlan {
    pub fn new(operands: Vec<Vec<Label>>, output: Vec<Label>) -> Self {
        Self { operands, output }
    }

    /// d개의 TT 코어 `(r_{k}, m_k, n_k, r_{k+1})` 체인 축약식
    ///
    /// 랭크 위치 d+1개, 출력 모드 d개, 입력 모드 d개에 서로 다른 라벨을 할당하고
    /// 이웃 코어끼리 랭크 라벨을 공유시킨다. 출력은 `(m1..md, n1..nd)`.
    pub fn tensor_train(d: usize) -> Self {
        let rank = |k: usize| k;
        let out_mode = |k: usize| d + 1 + k;
        let in_mode = |k: usize| 2 * d + 1 + k;

        let operands = (0..d)
            .map(|k| vec![rank(k), out_mode(k), in_mode(k), rank(k + 1)])
            .collect();
        let output = (0..d).map(out_mode).chain((0..d).map(in_mode)).collect();

        Self { operands, output }
    }

    /// `"ab,bc->ac"` 형식의 einsum 문자열 파싱
    pub fn parse(equation: &str) -> Result<Self> {
        let (lhs, rhs) = equation
            .split_once("->")
            .ok_or_else(|| TtError::invalid_config(format!("'->'가 없는 축약식: {}", equation)))?;

        let labels = |term: &str| -> Vec<Label> {
            term.chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c as Label)
                .collect()
        };

        let operands = lhs.split(',').map(labels).collect();
        Ok(Self {
            operands,
            output: labels(rhs),
        })
    }

    /// 사용된 서로 다른 라벨 수
    pub fn label_count(&self) -> usize {
        self.operands
            .iter()
            .flatten()
            .chain(self.output.iter())
            .collect::<HashSet<_>>()
            .len()
    }
}

impl fmt::Display for ContractionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: HashMap<Label, String> = HashMap::new();
        let mut symbol = |label: Label| -> String {
            let next = symbols.len();
            symbols
                .entry(label)
                .or_insert_with(|| match LETTERS.get(next) {
                    Some(&c) => (c as char).to_string(),
                    None => format!("[{}]", label),
                })
                .clone()
        };

        let terms: Vec<String> = self
            .operands
            .iter()
            .map(|op| op.iter().map(|&l| symbol(l)).collect())
            .collect();
        let output: String = self.output.iter().map(|&l| symbol(l)).collect();
        write!(f, "{}->{}", terms.join(","), output)
    }
}

/// 라벨이 붙은 중간 텐서
struct Labeled {
    tensor: Tensor,
    labels: Vec<Label>,
}

impl Labeled {
    fn new(tensor: Tensor, labels: Vec<Label>) -> Result<Self> {
        if tensor.rank() != labels.len() {
            return Err(TtError::shape_mismatch(
                format!("rank {}", labels.len()),
                format!("rank {}", tensor.rank()),
            ));
        }
        let unique: HashSet<_> = labels.iter().collect();
        if unique.len() != labels.len() {
            return Err(TtError::invalid_config(
                "한 피연산자 안에서 반복된 라벨(대각 축약)은 지원하지 않음",
            ));
        }
        Ok(Self { tensor, labels })
    }

    fn size_of(&self, label: Label) -> usize {
        let pos = self.labels.iter().position(|&l| l == label).unwrap_or(0);
        self.tensor.dims()[pos]
    }

    /// `keep`에 없는 라벨 축을 합산해 제거
    fn sum_out(self, keep: &HashSet<Label>) -> Result<Self> {
        let dims: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, l)| !keep.contains(l))
            .map(|(i, _)| i)
            .collect();
        if dims.is_empty() {
            return Ok(self);
        }

        let tensor = self.tensor.sum(dims)?;
        let labels = self.labels.into_iter().filter(|l| keep.contains(l)).collect();
        Ok(Self { tensor, labels })
    }

    /// 주어진 라벨 순서로 축 재배열
    fn arrange(self, order: &[Label]) -> Result<Tensor> {
        let permutation: Vec<usize> = order
            .iter()
            .map(|l| self.labels.iter().position(|x| x == l).unwrap_or(0))
            .collect();
        let is_identity = permutation.iter().enumerate().all(|(i, &p)| i == p);
        if is_identity {
            return Ok(self.tensor);
        }
        Ok(self.tensor.permute(permutation)?.contiguous()?)
    }
}

/// 두 피연산자 축약. `keep`은 이후 피연산자나 출력에 남아야 하는 라벨 집합.
fn contract_pair(lhs: Labeled, rhs: Labeled, keep: &HashSet<Label>) -> Result<Labeled> {
    let lhs_keep: HashSet<Label> = keep.iter().chain(rhs.labels.iter()).copied().collect();
    let rhs_keep: HashSet<Label> = keep.iter().chain(lhs.labels.iter()).copied().collect();
    let lhs = lhs.sum_out(&lhs_keep)?;
    let rhs = rhs.sum_out(&rhs_keep)?;

    let shared: Vec<Label> = lhs
        .labels
        .iter()
        .filter(|l| rhs.labels.contains(l))
        .copied()
        .collect();
    for &label in &shared {
        if lhs.size_of(label) != rhs.size_of(label) {
            return Err(TtError::shape_mismatch(
                format!("label {} size {}", label, lhs.size_of(label)),
                format!("{}", rhs.size_of(label)),
            ));
        }
    }

    let batch: Vec<Label> = shared.iter().filter(|l| keep.contains(l)).copied().collect();
    let summed: Vec<Label> = shared.iter().filter(|l| !keep.contains(l)).copied().collect();
    let lhs_free: Vec<Label> = lhs.labels.iter().filter(|l| !shared.contains(l)).copied().collect();
    let rhs_free: Vec<Label> = rhs.labels.iter().filter(|l| !shared.contains(l)).copied().collect();

    let sizes = |side: &Labeled, labels: &[Label]| -> Vec<usize> {
        labels.iter().map(|&l| side.size_of(l)).collect()
    };
    let batch_dims = sizes(&lhs, &batch);
    let lhs_free_dims = sizes(&lhs, &lhs_free);
    let rhs_free_dims = sizes(&rhs, &rhs_free);
    let summed_size: usize = sizes(&lhs, &summed).iter().product();
    let batch_size: usize = batch_dims.iter().product();
    let lhs_size: usize = lhs_free_dims.iter().product();
    let rhs_size: usize = rhs_free_dims.iter().product();

    let lhs_order: Vec<Label> = [&batch[..], &lhs_free[..], &summed[..]].concat();
    let rhs_order: Vec<Label> = [&batch[..], &summed[..], &rhs_free[..]].concat();

    let a = lhs.arrange(&lhs_order)?.reshape((batch_size, lhs_size, summed_size))?;
    let b = rhs.arrange(&rhs_order)?.reshape((batch_size, summed_size, rhs_size))?;
    let product = a.matmul(&b)?;

    let out_dims: Vec<usize> = [batch_dims, lhs_free_dims, rhs_free_dims].concat();
    let out_labels: Vec<Label> = [batch, lhs_free, rhs_free].concat();
    Labeled::new(product.reshape(out_dims)?, out_labels)
}

/// 일반화된 n항 텐서 축약
///
/// 출력에 없는 모든 라벨은 합산된다. 피연산자를 왼쪽부터 차례로 접으며,
/// 각 단계에서 아직 필요한 라벨만 유지한다.
pub fn contract(plan: &ContractionPlan, operands: &[&Tensor]) -> Result<Tensor> {
    if operands.is_empty() {
        return Err(TtError::invalid_config("축약할 피연산자가 없음"));
    }
    if operands.len() != plan.operands.len() {
        return Err(TtError::invalid_config(format!(
            "축약식 피연산자 {}개, 실제 텐서 {}개",
            plan.operands.len(),
            operands.len()
        )));
    }

    // i번째 이후 피연산자들과 출력에서 필요한 라벨
    let needed_after = |i: usize| -> HashSet<Label> {
        plan.operands[i + 1..]
            .iter()
            .flatten()
            .chain(plan.output.iter())
            .copied()
            .collect()
    };

    let mut acc = Labeled::new(operands[0].clone(), plan.operands[0].clone())?;
    for i in 1..operands.len() {
        let rhs = Labeled::new(operands[i].clone(), plan.operands[i].clone())?;
        acc = contract_pair(acc, rhs, &needed_after(i))?;
    }

    let output: HashSet<Label> = plan.output.iter().copied().collect();
    let acc = acc.sum_out(&output)?;
    for label in &plan.output {
        if !acc.labels.contains(label) {
            return Err(TtError::invalid_config(format!(
                "출력 라벨 {}이(가) 어떤 피연산자에도 없음",
                label
            )));
        }
    }
    acc.arrange(&plan.output)
}
