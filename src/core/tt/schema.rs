//! TT 모드/랭크 스키마
//!
//! 잘못된 분해 구성은 모두 여기서 거부된다.

use crate::core::math::{checked_product, product};
use crate::error::{Result, TtError};
use serde::Serialize;

/// `in_features = ∏ in_modes`, `out_features = ∏ out_modes`,
/// `ranks = [1, r1, …, r_{d-1}, 1]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtSchema {
    in_modes: Vec<usize>,
    out_modes: Vec<usize>,
    ranks: Vec<usize>,
}

impl TtSchema {
    /// 스키마 생성 및 검증
    pub fn new(in_modes: Vec<usize>, out_modes: Vec<usize>, ranks: Vec<usize>) -> Result<Self> {
        let d = in_modes.len();
        if out_modes.len() != d {
            return Err(TtError::invalid_config(format!(
                "in_modes와 out_modes 길이가 다름: {} vs {}",
                d,
                out_modes.len()
            )));
        }
        if ranks.len() != d + 1 {
            return Err(TtError::invalid_config(format!(
                "ranks 길이는 d+1 = {}이어야 함, got {}",
                d + 1,
                ranks.len()
            )));
        }
        if ranks[0] != 1 || ranks[d] != 1 {
            return Err(TtError::invalid_config(format!(
                "경계 랭크는 1이어야 함: r0={}, rd={}",
                ranks[0], ranks[d]
            )));
        }
        if ranks.iter().any(|&r| r == 0) {
            return Err(TtError::invalid_config(format!("랭크는 양수여야 함: {:?}", ranks)));
        }
        if in_modes.iter().chain(out_modes.iter()).any(|&m| m == 0) {
            return Err(TtError::invalid_config(format!(
                "모드는 양수여야 함: in={:?}, out={:?}",
                in_modes, out_modes
            )));
        }
        if checked_product(&in_modes).is_none() || checked_product(&out_modes).is_none() {
            return Err(TtError::invalid_config(format!(
                "모드 곱이 usize 범위를 넘음: in={:?}, out={:?}",
                in_modes, out_modes
            )));
        }
        let core_overflow = (0..d).any(|k| {
            checked_product(&[ranks[k], out_modes[k], in_modes[k], ranks[k + 1]]).is_none()
        });
        if core_overflow {
            return Err(TtError::invalid_config(format!(
                "코어 크기가 usize 범위를 넘음: ranks={:?}",
                ranks
            )));
        }

        Ok(Self {
            in_modes,
            out_modes,
            ranks,
        })
    }

    /// 코어 개수 d
    pub fn depth(&self) -> usize {
        self.in_modes.len()
    }

    pub fn in_modes(&self) -> &[usize] {
        &self.in_modes
    }

    pub fn out_modes(&self) -> &[usize] {
        &self.out_modes
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    pub fn in_features(&self) -> usize {
        product(&self.in_modes)
    }

    pub fn out_features(&self) -> usize {
        product(&self.out_modes)
    }

    /// k번째 코어 형상 `(r_left, out_mode, in_mode, r_right)`
    pub fn core_shape(&self, k: usize) -> (usize, usize, usize, usize) {
        (
            self.ranks[k],
            self.out_modes[k],
            self.in_modes[k],
            self.ranks[k + 1],
        )
    }

    /// 코어 파라미터 총 개수
    pub fn core_parameters(&self) -> usize {
        (0..self.depth())
            .map(|k| {
                let (r0, m, n, r1) = self.core_shape(k);
                r0 * m * n * r1
            })
            .fold(0usize, usize::saturating_add)
    }
}
