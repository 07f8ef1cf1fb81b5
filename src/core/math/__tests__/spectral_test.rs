use crate::core::math::spectral::*;
use approx::assert_relative_eq;
use candle_core::{Device, Tensor};
use nalgebra::DMatrix;

#[test]
fn 곱_계산_테스트() {
    assert_eq!(product(&[4, 4, 3]), 48);
    assert_eq!(product(&[]), 1, "빈 시퀀스의 곱은 1");
    assert_eq!(checked_product(&[4, 4, 3]), Some(48));
    assert_eq!(checked_product(&[1 << 33, 1 << 33]), None);
}

#[test]
fn 절단_svd_내림차순_테스트() {
    let matrix = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![1.0, 5.0, 3.0]));

    let full = truncated_svd(&matrix, None);
    assert_eq!(full.len(), 3);
    assert_relative_eq!(full[0], 5.0, epsilon = 1e-9);
    assert_relative_eq!(full[1], 3.0, epsilon = 1e-9);
    assert_relative_eq!(full[2], 1.0, epsilon = 1e-9);

    let top2 = truncated_svd(&matrix, Some(2));
    assert_eq!(top2.len(), 2);
    assert_relative_eq!(top2[1], 3.0, epsilon = 1e-9);

    // rank가 특이값 개수보다 크면 그대로
    assert_eq!(truncated_svd(&matrix, Some(10)).len(), 3);
}

#[test]
fn 엔트로피_균등분포_테스트() {
    let uniform = vec![1.0; 4];
    let ln4 = 4.0f64.ln();

    assert_relative_eq!(shannon_entropy(&uniform), ln4, epsilon = 1e-6);
    assert_relative_eq!(renyi_entropy(&uniform, 2.0), ln4, epsilon = 1e-6);
    assert_relative_eq!(renyi_entropy(&uniform, 0.5), ln4, epsilon = 1e-6);
    println!("✅ 균등분포 엔트로피 = ln 4");
}

#[test]
fn 엔트로피_단일값_테스트() {
    // 스펙트럼이 하나로 붕괴하면 엔트로피는 0
    let collapsed = vec![3.0, 0.0, 0.0];
    assert!(shannon_entropy(&collapsed).abs() < 1e-6);
    assert!(renyi_entropy(&collapsed, 2.0).abs() < 1e-6);

    // 0 스펙트럼에서도 NaN이 나오면 안 됨
    let zeros = vec![0.0; 3];
    assert!(shannon_entropy(&zeros).is_finite());
    assert!(renyi_entropy(&zeros, 2.0).is_finite());
}

#[test]
fn 핵노름_테스트() {
    let matrix = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, -4.0]);
    assert_relative_eq!(nuclear_norm(&matrix), 7.0, epsilon = 1e-9);
}

#[test]
fn 유효랭크_예제_테스트() {
    // 누적합 8, 12, 14, 15 중 0.99 × 15 = 14.85를 처음 넘는 것은 4번째
    assert_eq!(effective_rank(&[8.0, 4.0, 2.0, 1.0], 0.99), 4);
    assert_eq!(effective_rank(&[8.0, 4.0, 2.0, 1.0], 0.5), 1);
    assert_eq!(effective_rank(&[1.0, 2.0, 4.0, 8.0], 0.7), 2, "정렬 순서와 무관");
}

#[test]
fn 유효랭크_단조성_테스트() {
    let values = [5.0, 3.0, 2.0, 1.0, 0.5, 0.1];
    let mut previous = 0;
    for step in 0..=20 {
        let threshold = step as f64 / 20.0;
        let rank = effective_rank(&values, threshold);
        assert!(rank >= previous, "threshold {}에서 랭크 감소", threshold);
        assert!(rank <= values.len());
        previous = rank;
    }
    assert_eq!(effective_rank(&[], 0.99), 0);
    assert_eq!(effective_rank(&[0.0, 0.0], 0.99), 0);
}

#[test]
fn 언폴딩_특이값_랭크_테스트() {
    let device = Device::Cpu;
    // 외적 구조: W[(i1,i2),(j1,j2)] = a[i1,j1] * b[i2,j2] → 첫 번째 언폴딩 랭크 1
    let a = [1.0f32, 2.0, -1.0, 0.5];
    let b = [0.3f32, -0.7, 1.1, 2.0];
    let mut data = vec![0.0f32; 16];
    for i1 in 0..2 {
        for i2 in 0..2 {
            for j1 in 0..2 {
                for j2 in 0..2 {
                    let row = i1 * 2 + i2;
                    let col = j1 * 2 + j2;
                    data[row * 4 + col] = a[i1 * 2 + j1] * b[i2 * 2 + j2];
                }
            }
        }
    }
    let weight = Tensor::from_vec(data, (4, 4), &device).unwrap();

    let spectra = unfolding_singular_values(&weight, &[2, 2], &[2, 2]).unwrap();
    assert_eq!(spectra.len(), 1, "d = 2이면 언폴딩은 하나");
    assert!(spectra[0][0] > 1e-3);
    for tail in &spectra[0][1..] {
        assert!(*tail < 1e-5, "외적 가중치의 언폴딩 랭크는 1이어야 함: {:?}", spectra[0]);
    }
}

#[test]
fn 인터리브_형상_불일치_테스트() {
    let weight = Tensor::zeros((4, 6), candle_core::DType::F32, &Device::Cpu).unwrap();
    assert!(interleave_modes(&weight, &[2, 2], &[2, 2]).is_err());
    assert!(interleave_modes(&weight, &[2, 2], &[6]).is_err());
}
