use crate::core::penalty::PenaltyConfig;
use crate::core::tt::{relative_error, TtLayer};
use crate::model::{get_module, gpt2_like, HostConfig, Module};
use crate::recipe::*;
use candle_core::{Device, Tensor};

fn tiny_host() -> Module {
    gpt2_like(&HostConfig::tiny(), &Device::Cpu).unwrap()
}

fn dense_weight(model: &Module, path: &str) -> Tensor {
    match get_module(model, path).unwrap() {
        Module::Linear(linear) => linear.weight().clone(),
        other => panic!("Linear가 아님: {}", other.kind()),
    }
}

fn tt_weight(model: &Module, path: &str) -> Tensor {
    get_module(model, path)
        .unwrap()
        .as_tt_layer()
        .unwrap()
        .reconstruct_weight()
        .unwrap()
}

#[test]
fn 어휘_모드_조정_테스트() {
    // 정확히 일치
    assert_eq!(reconcile_vocab_modes(&[8, 8], 2, 64), vec![8, 8]);
    // 부족: 길이만 맞춘다
    assert_eq!(reconcile_vocab_modes(&[4, 4], 2, 64), vec![4, 4]);
    assert_eq!(reconcile_vocab_modes(&[8], 2, 64), vec![8, 1]);
    // 초과: 앞에서부터 남기고 1로 채운다
    assert_eq!(reconcile_vocab_modes(&[8, 16], 2, 64), vec![8, 1]);
    assert_eq!(reconcile_vocab_modes(&[4, 8, 8, 8, 25], 5, 50257), vec![4, 8, 8, 8, 1]);
    assert_eq!(reconcile_vocab_modes(&[100, 2], 2, 64), vec![1, 1]);
    // 곱이 usize를 넘어도 누적 곱 검사로 끊는다
    assert_eq!(reconcile_vocab_modes(&[1 << 33, 1 << 33], 2, 64), vec![1, 1]);
    assert_eq!(reconcile_vocab_modes(&[8, 1 << 62, 1 << 62], 3, 64), vec![8, 1, 1]);
}

#[test]
fn 선형_레이어_교체_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny").with_target(Target::new(
        "transformer.h[*].mlp.c_fc",
        vec![4, 4],
        vec![8, 8],
        vec![1, 2, 1],
    ));

    let summary = apply_recipe(&mut model, &recipe);

    assert_eq!(summary.replaced, vec!["transformer.h.0.mlp.c_fc", "transformer.h.1.mlp.c_fc"]);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.dense_params, 8896);
    // 블록마다 1088 → 64 + 64 + 64
    assert_eq!(summary.tt_params, 8896 - 2 * (1088 - 192));
    assert!((summary.compression_ratio - 8896.0 / 7104.0).abs() < 1e-12);
    assert_eq!(get_module(&model, "transformer.h.1.mlp.c_fc").unwrap().kind(), "TTLinear");
    println!("✅ 압축률 {:.3}", summary.compression_ratio);
}

#[test]
fn 잘못된_target은_나머지를_막지_않음_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny")
        .with_target(Target::new("transformer.nothing[*]", vec![4, 4], vec![8, 8], vec![1, 2, 1]))
        .with_target(Target::new("transformer.h.0.mlp.nothing", vec![4, 4], vec![8, 8], vec![1, 2, 1]))
        .with_target(Target::new("transformer.h.0.ln_1", vec![4, 4], vec![4, 4], vec![1, 2, 1]))
        .with_target(Target::new("transformer.h.0.mlp.c_fc", vec![4, 4], vec![8, 8], vec![1, 2, 1]));

    let summary = apply_recipe(&mut model, &recipe);

    assert_eq!(summary.replaced, vec!["transformer.h.0.mlp.c_fc"]);
    assert_eq!(summary.errors.len(), 3);
    assert_eq!(summary.errors[0], "No modules found for path: transformer.nothing[*]");
    assert!(summary.errors[1].starts_with("Error replacing transformer.h.0.mlp.nothing:"));
    assert!(summary.errors[2].contains("Unsupported module type LayerNorm"));
    assert_eq!(get_module(&model, "transformer.h.0.ln_1").unwrap().kind(), "LayerNorm");
}

#[test]
fn 차원_불일치_선형은_교체하지_않음_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny").with_target(Target::new(
        "transformer.h.0.mlp.c_fc",
        vec![4, 5],
        vec![8, 8],
        vec![1, 2, 1],
    ));

    let summary = apply_recipe(&mut model, &recipe);
    assert!(summary.replaced.is_empty());
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.tt_params, summary.dense_params);
    assert_eq!(get_module(&model, "transformer.h.0.mlp.c_fc").unwrap().kind(), "Linear");
}

#[test]
fn 지원하지_않는_분해_방식_테스트() {
    let mut model = tiny_host();
    let mut target = Target::new("transformer.h.0.mlp.c_fc", vec![4, 4], vec![8, 8], vec![1, 2, 1]);
    target.decomp = Decomposition::Other("MPO".to_string());

    let summary = apply_recipe(&mut model, &Recipe::new("tiny").with_target(target));
    assert!(summary.replaced.is_empty());
    assert!(summary.errors[0].contains("Only TT is supported, got MPO"));
}

#[test]
fn ttsvd_완전_랭크_시드_테스트() {
    let mut model = tiny_host();
    let path = "transformer.h.0.mlp.c_fc";
    let original = dense_weight(&model, path);

    // 왼쪽 언폴딩 8·4 = 32, 오른쪽 8·4 = 32
    let recipe = Recipe::new("tiny").with_target(
        Target::new(path, vec![4, 4], vec![8, 8], vec![1, 32, 1]).with_init(InitPolicy::TtSvd),
    );
    let summary = apply_recipe(&mut model, &recipe);
    assert_eq!(summary.replaced.len(), 1);

    let err = relative_error(&original, &tt_weight(&model, path)).unwrap();
    assert!(err < 1e-4, "완전 랭크 오차 {}", err);
}

#[test]
fn ttsvd는_무작위보다_정확_테스트() {
    let path = "transformer.h.0.mlp.c_fc";
    let target = Target::new(path, vec![4, 4], vec![8, 8], vec![1, 4, 1]);

    let mut svd_model = tiny_host();
    let original = dense_weight(&svd_model, path);
    apply_recipe(
        &mut svd_model,
        &Recipe::new("tiny").with_target(target.clone().with_init(InitPolicy::TtSvd)),
    );

    let mut random_model = tiny_host();
    apply_recipe(&mut random_model, &Recipe::new("tiny").with_target(target));

    let svd_err = relative_error(&original, &tt_weight(&svd_model, path)).unwrap();
    let random_err = relative_error(&original, &tt_weight(&random_model, path)).unwrap();
    assert!(svd_err < random_err, "svd {} vs random {}", svd_err, random_err);
}

#[test]
fn 같은_시드는_같은_초기화_테스트() {
    let path = "transformer.h.1.mlp.c_proj";
    let recipe = Recipe::new("tiny").with_target(Target::new(path, vec![8, 8], vec![4, 4], vec![1, 3, 1]));

    let mut a = tiny_host();
    let mut b = tiny_host();
    apply_recipe(&mut a, &recipe);
    apply_recipe(&mut b, &recipe);

    let diff = (tt_weight(&a, path) - tt_weight(&b, path))
        .unwrap()
        .abs()
        .unwrap()
        .sum_all()
        .unwrap()
        .to_scalar::<f32>()
        .unwrap();
    assert_eq!(diff, 0.0);
}

#[test]
fn 임베딩_어휘_자동_조정_적용_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny").with_target(
        Target::new("transformer.wte", vec![8, 16], vec![4, 4], vec![1, 4, 1]).with_init(InitPolicy::TtSvd),
    );

    let summary = apply_recipe(&mut model, &recipe);
    assert_eq!(summary.replaced, vec!["transformer.wte"]);

    match get_module(&model, "transformer.wte").unwrap() {
        Module::TtEmbedding(tt) => {
            assert_eq!(tt.num_embeddings(), 8);
            assert_eq!(tt.embedding_dim(), 16);
            assert_eq!(tt.schema().in_modes(), &[8, 1]);
            assert_eq!(tt.schema().out_modes(), &[4, 4]);
            assert_eq!(tt.schema().ranks(), &[1, 4, 1]);
        }
        other => panic!("TTEmbedding이 아님: {}", other.kind()),
    }
}

#[test]
fn 진행_이벤트_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny")
        .with_target(Target::new("transformer.h[*].mlp.c_fc", vec![4, 4], vec![8, 8], vec![1, 2, 1]))
        .with_target(Target::new("missing[*]", vec![4, 4], vec![8, 8], vec![1, 2, 1]));

    let mut events = Vec::new();
    let summary = apply_recipe_with_progress(&mut model, &recipe, |p| events.push(p.clone()));

    assert_eq!(events.len(), 3);
    assert_eq!(summary.replaced.len(), 2);
    assert!(events[0].is_replaced());
    assert_eq!(events[0].step, 1);
    assert_eq!(events[0].total_targets, 2);
    assert_eq!(events[1].path, "transformer.h.1.mlp.c_fc");
    assert!(!events[2].is_replaced());
    assert!(events[2].snapshot.is_none());

    let snapshot = events[0].snapshot.as_ref().unwrap();
    assert_eq!(snapshot.ranks, vec![1, 2, 1]);
    assert_eq!(snapshot.cores.len(), 2);
    assert_eq!(snapshot.cores[0].core_shape, [1, 8, 4, 2]);
    assert_eq!(snapshot.cores[1].core_values.len(), 2 * 8 * 4);
    assert_eq!(snapshot.num_parameters, 192);

    let json = serde_json::to_value(&events[2]).unwrap();
    assert_eq!(json["outcome"]["status"], "failed");
}

#[test]
fn 스냅샷_값_개수_제한_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny").with_target(Target::new(
        "transformer.h.0.mlp.c_fc",
        vec![4, 4],
        vec![8, 8],
        vec![1, 40, 1],
    ));

    let mut largest = 0;
    apply_recipe_with_progress(&mut model, &recipe, |p| {
        for core in &p.snapshot.as_ref().unwrap().cores {
            largest = largest.max(core.core_values.len());
        }
    });
    // 8·4·40 = 1280개 중 앞 1000개
    assert_eq!(largest, MAX_SNAPSHOT_VALUES);
}

#[test]
fn 레시피_페널티_부착_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny")
        .with_target(
            Target::new("transformer.h[*].mlp.c_fc", vec![4, 4], vec![8, 8], vec![1, 2, 1])
                .with_penalty(PenaltyConfig::default()),
        )
        .with_target(
            Target::new("missing.path", vec![4, 4], vec![8, 8], vec![1, 2, 1])
                .with_penalty(PenaltyConfig::default()),
        );

    // 교체 전에는 밀집 레이어라 부착되지 않는다
    assert_eq!(attach_recipe_penalties(&mut model, &recipe), 0);

    apply_recipe(&mut model, &recipe);
    assert_eq!(attach_recipe_penalties(&mut model, &recipe), 2);
    let layer = get_module(&model, "transformer.h.0.mlp.c_fc").unwrap().as_tt_layer().unwrap();
    assert!(layer.penalty().is_some());
}

#[test]
fn 모드_곱_오버플로는_에러로_기록_테스트() {
    let mut model = tiny_host();
    let recipe = Recipe::new("tiny")
        .with_target(Target::new(
            "transformer.h.0.mlp.c_fc",
            vec![1 << 33, 1 << 33],
            vec![8, 8],
            vec![1, 2, 1],
        ))
        .with_target(Target::new("transformer.h.1.mlp.c_fc", vec![4, 4], vec![8, 8], vec![1, 2, 1]));

    let summary = apply_recipe(&mut model, &recipe);

    assert_eq!(summary.replaced, vec!["transformer.h.1.mlp.c_fc"]);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Error replacing transformer.h.0.mlp.c_fc:"));
    assert_eq!(get_module(&model, "transformer.h.0.mlp.c_fc").unwrap().kind(), "Linear");
    println!("✅ 오버플로 target: {}", summary.errors[0]);
}
