use anyhow::{bail, Context, Result};
use candle_core::Device;
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process;
use tt_llm::model::{compression_stats, format_number, gpt2_like, model_size_mb, HostConfig, Module};
use tt_llm::recipe::{
    apply_recipe, apply_recipe_with_progress, attach_recipe_penalties, load_recipe, save_recipe,
    validate_recipe, LayerOutcome, Recipe,
};

fn host_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("host")
            .long("host")
            .value_name("PRESET")
            .help("합성 호스트 프리셋 (gpt2 | tiny)")
            .default_value("gpt2"),
    )
    .arg(
        Arg::new("host-config")
            .long("host-config")
            .value_name("FILE")
            .help("HostConfig JSON/YAML 파일 (프리셋보다 우선)"),
    )
}

fn main() {
    env_logger::init();

    let matches = Command::new("TT Compress")
        .version(env!("CARGO_PKG_VERSION"))
        .about("레시피 기반 텐서 트레인 모델 압축 도구")
        .subcommand(
            Command::new("template")
                .about("예시 레시피 생성")
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("FILE")
                        .help("저장 경로 (없으면 표준 출력)"),
                ),
        )
        .subcommand(host_args(
            Command::new("validate")
                .about("레시피를 호스트 모델에 대해 검증")
                .arg(Arg::new("recipe").required(true).help("레시피 YAML 경로")),
        ))
        .subcommand(host_args(
            Command::new("apply")
                .about("레시피를 적용해 밀집 레이어를 TT 레이어로 교체")
                .arg(Arg::new("recipe").required(true).help("레시피 YAML 경로"))
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("검증 에러가 있으면 적용하지 않음"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("요약을 JSON으로 출력"),
                ),
        ))
        .subcommand(host_args(
            Command::new("stats")
                .about("파라미터/압축 통계")
                .arg(
                    Arg::new("recipe")
                        .long("recipe")
                        .short('r')
                        .value_name("FILE")
                        .help("통계 전에 적용할 레시피"),
                ),
        ))
        .get_matches();

    let result = match matches.subcommand() {
        Some(("template", sub)) => handle_template(sub),
        Some(("validate", sub)) => handle_validate(sub),
        Some(("apply", sub)) => handle_apply(sub),
        Some(("stats", sub)) => handle_stats(sub),
        _ => {
            println!("❌ 명령을 지정해주세요. --help를 참조하세요.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("❌ 오류: {:#}", e);
        process::exit(1);
    }
}

fn load_host_config(matches: &ArgMatches) -> Result<HostConfig> {
    if let Some(path) = matches.get_one::<String>("host-config") {
        let text = std::fs::read_to_string(path).with_context(|| format!("{} 읽기 실패", path))?;
        let is_json = Path::new(path)
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&text)?
        } else {
            serde_yaml::from_str(&text)?
        };
        return Ok(config);
    }

    match matches.get_one::<String>("host").map(String::as_str) {
        Some("tiny") => Ok(HostConfig::tiny()),
        Some("gpt2") | None => Ok(HostConfig::default()),
        Some(other) => bail!("알 수 없는 호스트 프리셋: {}", other),
    }
}

fn build_host(matches: &ArgMatches) -> Result<Module> {
    let config = load_host_config(matches)?;
    println!(
        "🏗️ 호스트 생성: vocab={}, n_embd={}, n_layer={}",
        config.vocab_size, config.n_embd, config.n_layer
    );
    Ok(gpt2_like(&config, &Device::Cpu)?)
}

fn read_recipe(matches: &ArgMatches, key: &str) -> Result<Option<Recipe>> {
    match matches.get_one::<String>(key) {
        Some(path) => {
            let recipe = load_recipe(path).with_context(|| format!("레시피 로드 실패: {}", path))?;
            Ok(Some(recipe))
        }
        None => Ok(None),
    }
}

fn handle_template(matches: &ArgMatches) -> Result<()> {
    let recipe = Recipe::gpt2_template();
    match matches.get_one::<String>("output") {
        Some(path) => {
            save_recipe(&recipe, path)?;
            println!("✅ 예시 레시피 저장: {}", path);
        }
        None => print!("{}", recipe.to_yaml_string()?),
    }
    Ok(())
}

fn handle_validate(matches: &ArgMatches) -> Result<()> {
    let Some(recipe) = read_recipe(matches, "recipe")? else {
        bail!("레시피 경로가 필요합니다");
    };
    let model = build_host(matches)?;
    let report = validate_recipe(&model, &recipe);

    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }
    for error in &report.errors {
        println!("❌ {}", error);
    }

    if report.is_valid {
        println!("✅ 레시피 유효 (경고 {}개)", report.warnings.len());
        Ok(())
    } else {
        bail!("레시피 에러 {}개", report.errors.len())
    }
}

fn handle_apply(matches: &ArgMatches) -> Result<()> {
    let Some(recipe) = read_recipe(matches, "recipe")? else {
        bail!("레시피 경로가 필요합니다");
    };
    let json = matches.get_flag("json");
    let mut model = build_host(matches)?;

    let report = validate_recipe(&model, &recipe);
    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }
    if !report.is_valid {
        for error in &report.errors {
            println!("❌ {}", error);
        }
        if matches.get_flag("strict") {
            bail!("검증 실패로 적용 중단 (--strict)");
        }
    }

    let pb = ProgressBar::new(recipe.targets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} target {msg}")?
            .progress_chars("=> "),
    );

    let summary = apply_recipe_with_progress(&mut model, &recipe, |progress| {
        pb.set_position(progress.step.saturating_sub(1) as u64);
        match &progress.outcome {
            LayerOutcome::Replaced => pb.set_message(progress.path.clone()),
            LayerOutcome::Failed { error } => pb.println(format!("❌ {}", error)),
        }
    });
    pb.finish_with_message("완료");

    let attached = attach_recipe_penalties(&mut model, &recipe);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n🏆 압축 완료!");
    println!("   교체된 레이어: {}", summary.replaced.len());
    println!("   에러: {}", summary.errors.len());
    println!(
        "   파라미터: {} → {}",
        format_number(summary.dense_params),
        format_number(summary.tt_params)
    );
    println!("   압축률: {:.2}:1", summary.compression_ratio);
    if attached > 0 {
        println!("   페널티 부착: {}개 레이어", attached);
    }
    Ok(())
}

fn handle_stats(matches: &ArgMatches) -> Result<()> {
    let mut model = build_host(matches)?;
    if let Some(recipe) = read_recipe(matches, "recipe")? {
        let summary = apply_recipe(&mut model, &recipe);
        println!(
            "🗜️ 레시피 적용: 교체 {}개, 에러 {}개",
            summary.replaced.len(),
            summary.errors.len()
        );
    }

    let stats = compression_stats(&model);
    println!("📊 모델 통계:");
    println!("   전체 파라미터: {}", format_number(stats.total_params));
    println!("   TT 파라미터: {}", format_number(stats.tt_params));
    println!("   밀집 파라미터: {}", format_number(stats.dense_params));
    println!("   TT 대비 밀집 비율: {:.2}", stats.compression_ratio);
    println!("   크기 (f32): {:.2} MB", model_size_mb(&model));
    Ok(())
}
