use clap::{Arg, Command};
use loalsim::config::ScenarioConfig;
use loalsim::logging::{LogConfig, LogOutput, init_logging, level_from_verbosity, parse_log_level};
use loalsim::simulation::SimulationEngine;

/// `--test` で実行する組み込みシナリオ
const BUILTIN_SCENARIOS: [(&str, &str); 3] = [
    ("rear_launch", include_str!("../scenarios/rear_launch.yaml")),
    ("flare_evasion", include_str!("../scenarios/flare_evasion.yaml")),
    ("terrain_masking", include_str!("../scenarios/terrain_masking.yaml")),
];

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("loalsim")
        .version("0.1.0")
        .about("発射後ロックオン（LOAL）シミュレーション")
        .long_about("IR誘導弾の発射後ロックオンを評価するシミュレーションシステム\n\
                     時間駆動型シミュレーションで捜索・フレア回避・終末判定の挙動を確認します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、使用方法を表示します。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
                .conflicts_with("test")
        )
        .arg(
            Arg::new("test")
                .short('t')
                .long("test")
                .action(clap::ArgAction::SetTrue)
                .help("組み込みシナリオでLOALの動作確認を実行")
                .conflicts_with("info")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("ログレベル (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .value_parser(["console", "file", "both"])
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ")
        )
        .get_matches();

    println!("発射後ロックオンシミュレーション - loalsim v0.1.0");
    println!();

    // 詳細レベルの設定
    let verbose_level = matches.get_count("verbose");
    if verbose_level > 0 {
        println!("詳細出力レベル: {}", verbose_level);
    }

    let log_config = build_log_config(&matches, verbose_level);
    let _log_guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    // テストモードの実行
    if matches.get_flag("test") {
        println!("=== 組み込みシナリオテストモード ===");
        if let Err(e) = run_builtin_scenarios(verbose_level) {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // シナリオファイルの処理
    if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        match run_scenario(scenario_path, matches.get_flag("info"), verbose_level) {
            Ok(_) => {
                if verbose_level > 0 {
                    println!("シナリオ実行が正常に完了しました。");
                }
            }
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        show_default_help();
    }
}

/// コマンドライン引数からログ設定を組み立てる（`-v` は `--log-level` より優先）
fn build_log_config(matches: &clap::ArgMatches, verbose_level: u8) -> LogConfig {
    let level = level_from_verbosity(verbose_level).unwrap_or_else(|| {
        matches
            .get_one::<String>("log-level")
            .map(|s| parse_log_level(s))
            .unwrap_or(tracing::Level::INFO)
    });

    let output = matches
        .get_one::<String>("log-output")
        .and_then(|s| s.parse::<LogOutput>().ok())
        .unwrap_or(LogOutput::Console);

    let log_dir = matches
        .get_one::<String>("log-dir")
        .cloned()
        .unwrap_or_else(|| "logs".to_string());

    LogConfig {
        level,
        output,
        log_dir,
        ..LogConfig::default()
    }
}

/// 組み込みシナリオを順に実行
fn run_builtin_scenarios(verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    for (name, contents) in BUILTIN_SCENARIOS {
        println!("\n--- {} ---", name);
        let scenario = ScenarioConfig::from_yaml_str(contents)?;
        execute_scenario(scenario, verbose_level)?;
    }

    println!("\n全ての組み込みシナリオが正常に実行されました！");
    Ok(())
}

/// シナリオファイルを読み込んで実行
fn run_scenario(scenario_path: &str, info_only: bool, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    execute_scenario(scenario, verbose_level)
}

/// シナリオの実行
fn execute_scenario(scenario: ScenarioConfig, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    if verbose_level > 0 {
        println!("シミュレーション設定:");
        println!("  時間刻み: {:.3}秒", scenario.sim.dt_s);
        println!("  最大時間: {:.1}秒", scenario.sim.t_max_s);
        println!("  捜索ウィンドウ: {:.1}秒", scenario.loal.search_duration_s);
        println!();
    }

    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;
    simulation.run()?;

    let s = &simulation.stats;
    println!("結果:");
    println!("  発射: {}発 (後方発射 {}発)", s.missiles_launched, s.rear_launches);
    println!("  LOAL捕捉: {}回 / フレア回避: {}回", s.acquisitions, s.evasions);
    println!("  自爆抑止: {}ティック / ウィンドウ満了: {}回", s.suppressed_terminal, s.windows_expired);
    println!(
        "  命中: {} / 自爆: {} / 射程切れ: {} / 失速: {}",
        s.hits, s.self_destructs, s.out_of_range, s.stalled
    );

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  loalsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>   シナリオファイルを指定して実行");
    println!("  -i, --info              シナリオ情報のみ表示");
    println!("  -t, --test              組み込みシナリオで動作確認");
    println!("  -v, --verbose           詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level <LEVEL> ログレベル");
    println!("      --log-output <OUT>  ログ出力先 (console, file, both)");
    println!("      --log-dir <DIR>     ログディレクトリ");
    println!("  -h, --help              このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    for (name, _) in BUILTIN_SCENARIOS {
        println!("  scenarios/{}.yaml", name);
    }
    println!();
    println!("例:");
    println!("  loalsim -s scenarios/rear_launch.yaml");
    println!("  loalsim -s scenarios/flare_evasion.yaml -vv --log-output both");
    println!("  loalsim --test");
}
