//! 모드/랭크 대수 및 특이값 스펙트럼 측도
//!
//! 정수 튜플 곱, 절단 SVD, Rényi/Shannon 엔트로피, 핵 노름, 유효 랭크 등
//! 다른 컴포넌트에 의존하지 않는 순수 수치 함수들

use crate::error::{Result, TtError};
use candle_core::{DType, Tensor};
use nalgebra::DMatrix;

/// log(0) 방지용 가산 엡실론
pub const SPECTRAL_EPS: f64 = 1e-12;

/// 정수 시퀀스의 곱 (빈 시퀀스는 1)
pub fn product(values: &[usize]) -> usize {
    values.iter().product()
}

/// 오버플로를 검사하는 곱. `usize`를 넘으면 `None`.
pub fn checked_product(values: &[usize]) -> Option<usize> {
    values.iter().try_fold(1usize, |acc, &m| acc.checked_mul(m))
}

/// 전체 SVD 후 상위 `rank`개의 특이값만 남긴다 (내림차순)
pub fn truncated_svd(matrix: &DMatrix<f64>, rank: Option<usize>) -> Vec<f64> {
    let svd = matrix.clone().svd(false, false);
    let mut values: Vec<f64> = svd.singular_values.iter().copied().collect();
    values.sort_by(|a, b| b.total_cmp(a));
    if let Some(rank) = rank {
        values.truncate(rank);
    }
    values
}

/// Rényi 엔트로피 H_α(p) = (1/(1-α)) · log(Σ p_i^α)
///
/// `values`를 확률 벡터로 정규화한 뒤 계산하며, α = 1이면 Shannon 엔트로피로 수렴한다.
pub fn renyi_entropy(values: &[f64], alpha: f64) -> f64 {
    let total: f64 = values.iter().sum();
    let probs = values.iter().map(|v| v / (total + SPECTRAL_EPS));

    if (alpha - 1.0).abs() < f64::EPSILON {
        return -probs.map(|p| p * (p + SPECTRAL_EPS).ln()).sum::<f64>();
    }

    let power_sum: f64 = probs.map(|p| p.powf(alpha)).sum();
    (1.0 / (1.0 - alpha)) * (power_sum + SPECTRAL_EPS).ln()
}

/// Shannon 엔트로피 H(p) = -Σ p_i log p_i
pub fn shannon_entropy(values: &[f64]) -> f64 {
    renyi_entropy(values, 1.0)
}

/// 핵 노름 (특이값의 합)
pub fn nuclear_norm(matrix: &DMatrix<f64>) -> f64 {
    truncated_svd(matrix, None).iter().sum()
}

/// 누적 에너지 기반 유효 랭크
///
/// 내림차순 정렬된 특이값의 누적합이 처음으로 `threshold · total`을 넘는 지점까지의 개수.
pub fn effective_rank(values: &[f64], threshold: f64) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let total: f64 = sorted.iter().sum();
    if sorted.is_empty() || total <= 0.0 {
        return 0;
    }

    let limit = threshold * total;
    let mut cumulative = 0.0;
    for (idx, value) in sorted.iter().enumerate() {
        cumulative += value;
        if cumulative > limit {
            return idx + 1;
        }
    }
    sorted.len()
}

/// 2차원 candle 텐서를 nalgebra f64 행렬로 변환
pub fn tensor_to_dmatrix(tensor: &Tensor) -> Result<DMatrix<f64>> {
    let (rows, cols) = tensor.dims2()?;
    let data = tensor
        .to_dtype(DType::F64)?
        .flatten_all()?
        .to_vec1::<f64>()?;
    Ok(DMatrix::from_row_slice(rows, cols, &data))
}

/// `(out_features, in_features)` 가중치를 인터리브 순서 `(m1, n1, m2, n2, …)` 텐서로 재배열
///
/// TT 코어 k의 왼쪽 묶음 `(r_{k-1}, m_k, n_k)`가 메모리상 연속되도록 만든다.
pub fn interleave_modes(weight: &Tensor, out_modes: &[usize], in_modes: &[usize]) -> Result<Tensor> {
    let d = out_modes.len();
    if in_modes.len() != d {
        return Err(TtError::invalid_config(format!(
            "in_modes 길이 {} != out_modes 길이 {}",
            in_modes.len(),
            d
        )));
    }

    let expected = (product(out_modes), product(in_modes));
    let got = weight.dims2()?;
    if got != expected {
        return Err(TtError::shape_mismatch(
            format!("{:?}", expected),
            format!("{:?}", got),
        ));
    }

    let mut tensor_dims = out_modes.to_vec();
    tensor_dims.extend_from_slice(in_modes);
    let tensor = weight.reshape(tensor_dims)?;

    let permutation: Vec<usize> = (0..d).flat_map(|k| [k, d + k]).collect();
    Ok(tensor.permute(permutation)?.contiguous()?)
}

/// 언폴딩별 특이값
///
/// 가중치를 `(m1..md, n1..nd)`로 보고 k번째 `(m_k, n_k)` 쌍 뒤에서 잘라 만든
/// 2차원 행렬들(k = 1..d-1)의 특이값 스펙트럼을 반환한다.
pub fn unfolding_singular_values(
    weight: &Tensor,
    out_modes: &[usize],
    in_modes: &[usize],
) -> Result<Vec<Vec<f64>>> {
    let interleaved = interleave_modes(weight, out_modes, in_modes)?;
    let total = interleaved.elem_count();
    let d = out_modes.len();

    let mut spectra = Vec::with_capacity(d.saturating_sub(1));
    for k in 1..d {
        let left = product(&out_modes[..k]) * product(&in_modes[..k]);
        let right = total / left;
        let unfolding = tensor_to_dmatrix(&interleaved.reshape((left, right))?)?;
        spectra.push(truncated_svd(&unfolding, None));
    }
    Ok(spectra)
}
