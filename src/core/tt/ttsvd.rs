//! TT-SVD 초기화
//!
//! 밀집 가중치 `(out_features, in_features)`를 왼쪽에서 오른쪽으로 순차 SVD하여
//! 스키마의 랭크로 절단된 TT 코어를 만든다. 단계 간 재최적화 없는 결정적 탐욕 근사.

use super::schema::TtSchema;
use crate::core::math::interleave_modes;
use crate::error::{Result, TtError};
use candle_core::{DType, Tensor};
use nalgebra::DMatrix;

/// 밀집 가중치를 TT 코어 목록으로 분해
///
/// - 단계 k의 행렬: 왼쪽 `(r_{k-1}, m_k, n_k)`, 오른쪽 나머지 모드 전체
/// - 첫 번째 코어는 `U·diag(S)`를 흡수하고 나머지는 `Vh`
/// - 이후 코어는 `U`, 나머지는 `diag(S)·Vh`
/// - 마지막에 남는 1×1 값은 마지막 코어에 접어 넣는다
///
/// 특이값이 요청 랭크보다 적으면 코어를 0으로 채워 스키마 형상을 맞춘다.
pub fn tt_svd(weight: &Tensor, schema: &TtSchema) -> Result<Vec<Tensor>> {
    let d = schema.depth();
    if d == 0 {
        return Err(TtError::invalid_config("d = 0 스키마는 TT-SVD로 분해할 수 없음"));
    }

    let device = weight.device().clone();
    let interleaved = interleave_modes(
        &weight.to_dtype(DType::F64)?,
        schema.out_modes(),
        schema.in_modes(),
    )?;
    let mut remainder: Vec<f64> = interleaved.flatten_all()?.to_vec1::<f64>()?;

    let mut cores = Vec::with_capacity(d);

    for k in 0..d {
        let (r_prev, m, n, target) = schema.core_shape(k);
        let left = r_prev * m * n;
        let right = remainder.len() / left;

        let matrix = DMatrix::from_row_slice(left, right, &remainder);
        let svd = matrix.svd(true, true);
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => return Err(TtError::invalid_config(format!("{}번째 언폴딩 SVD 실패", k))),
        };
        let singular = svd.singular_values;
        let keep = target.min(singular.len());

        // 코어: (left × target) 행 우선
        let mut core = vec![0.0f64; left * target];
        for i in 0..left {
            for j in 0..keep {
                let scale = if k == 0 { singular[j] } else { 1.0 };
                core[i * target + j] = u[(i, j)] * scale;
            }
        }

        // 다음 단계로 넘길 나머지: (target × right)
        let mut next = vec![0.0f64; target * right];
        for j in 0..keep {
            let scale = if k == 0 { 1.0 } else { singular[j] };
            for c in 0..right {
                next[j * right + c] = v_t[(j, c)] * scale;
            }
        }

        cores.push(core);
        remainder = next;
    }

    // ranks[d] == 1 이므로 나머지는 스칼라 하나
    let residual = remainder.first().copied().unwrap_or(0.0);
    if let Some(last) = cores.last_mut() {
        last.iter_mut().for_each(|v| *v *= residual);
    }

    cores
        .into_iter()
        .enumerate()
        .map(|(k, data)| {
            let (r0, m, n, r1) = schema.core_shape(k);
            let data: Vec<f32> = data.into_iter().map(|v| v as f32).collect();
            Ok(Tensor::from_vec(data, (r0, m, n, r1), &device)?)
        })
        .collect()
}

/// 상대 재구성 오차 ||W - Ŵ||_F / ||W||_F
pub fn relative_error(reference: &Tensor, approximation: &Tensor) -> Result<f64> {
    let reference = reference.to_dtype(DType::F64)?;
    let approximation = approximation.to_dtype(DType::F64)?;
    let diff = (&reference - &approximation)?.sqr()?.sum_all()?.to_scalar::<f64>()?;
    let norm = reference.sqr()?.sum_all()?.to_scalar::<f64>()?;
    if norm < 1e-20 {
        return Ok(if diff < 1e-20 { 0.0 } else { f64::INFINITY });
    }
    Ok((diff / norm).sqrt())
}
