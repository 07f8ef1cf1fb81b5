use crate::core::penalty::*;
use crate::core::tt::TtSchema;
use approx::assert_relative_eq;
use candle_core::{Device, Tensor};

#[test]
fn 페널티_설정_기본값_테스트() {
    let cfg: PenaltyConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg, PenaltyConfig::default());
    assert_eq!(cfg.kind, PenaltyKind::Renyi);
    assert_eq!(cfg.alpha, 2.0);
    assert_eq!(cfg.weight, 1e-4);
}

#[test]
fn 페널티_설정_키_이름_테스트() {
    let cfg: PenaltyConfig =
        serde_json::from_str(r#"{"type": "Shannon", "lambda": 0.5}"#).unwrap();
    assert_eq!(cfg, PenaltyConfig::standard(PenaltyKind::Shannon, 2.0, 0.5));

    // 알 수 없는 종류는 핵 노름
    let cfg: PenaltyConfig = serde_json::from_str(r#"{"type": "frobenius"}"#).unwrap();
    assert_eq!(cfg.kind, PenaltyKind::Nuclear);

    let json = serde_json::to_value(&PenaltyConfig::default()).unwrap();
    assert_eq!(json["type"], "renyi");
    assert_eq!(json["lambda"], 1e-4);
}

#[test]
fn 스펙트럼_측도_테스트() {
    let spectrum = [3.0, 1.0];
    let nuclear = PenaltyConfig::standard(PenaltyKind::Nuclear, 2.0, 1.0);
    assert_relative_eq!(nuclear.measure(&spectrum), 4.0);

    // 단일 특이값은 엔트로피 0
    let renyi = PenaltyConfig::default();
    assert_relative_eq!(renyi.measure(&[5.0]), 0.0, epsilon = 1e-9);
}

#[test]
fn 랭크_1_가중치_페널티_테스트() {
    // W[(m1,m2),(n1,n2)] = a[m1,n1]·b[m2,n2] 이므로 언폴딩 스펙트럼이 하나
    let a = Tensor::new(&[[1f32, 2.0], [3.0, 4.0]], &Device::Cpu).unwrap();
    let b = Tensor::new(&[[0.5f32, -1.0], [2.0, 1.0]], &Device::Cpu).unwrap();
    let weight = a
        .reshape((2, 1, 2, 1))
        .unwrap()
        .broadcast_mul(&b.reshape((1, 2, 1, 2)).unwrap())
        .unwrap()
        .reshape((4, 4))
        .unwrap();
    let schema = TtSchema::new(vec![2, 2], vec![2, 2], vec![1, 2, 1]).unwrap();

    let renyi = rank_penalty(&weight, &schema, &PenaltyConfig::standard(PenaltyKind::Renyi, 2.0, 1.0)).unwrap();
    assert!(renyi.abs() < 1e-5, "랭크 1 Rényi {}", renyi);

    let random = Tensor::randn(0f32, 1f32, (4, 4), &Device::Cpu).unwrap();
    let spread = rank_penalty(&random, &schema, &PenaltyConfig::standard(PenaltyKind::Renyi, 2.0, 1.0)).unwrap();
    assert!(spread > renyi);
}

#[test]
fn 누산기_실패시_0_테스트() {
    let slot = PenaltySlot::new(PenaltyConfig::default());
    let schema = TtSchema::new(vec![2, 2], vec![2, 2], vec![1, 2, 1]).unwrap();

    // 형상이 맞지 않는 가중치
    let wrong = Tensor::ones((3, 5), candle_core::DType::F32, &Device::Cpu).unwrap();
    slot.observe(&wrong, &schema);
    assert_eq!(slot.pending(), 0.0);
}
