//! 程序入口：初始化日志，加载源/目标文档，重放手势脚本并输出结果文档

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::SubscriberBuilder;

use json_field_mapper::utils::fs::read_text_file;
use json_field_mapper::vm::bridge::{
    mapping_rows, replay_gestures, Gesture, STATUS_ERROR_PREFIX, STATUS_LOADED, STATUS_NO_MAPPINGS,
    STATUS_READY, STATUS_SAVED,
};
use json_field_mapper::{MappingSession, SessionConfig};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "json_field_mapper", version, about = "Map fields from a source JSON onto a target JSON")]
struct Cli {
    /// 源 JSON 文件
    #[arg(long)]
    source: PathBuf,
    /// 目标 JSON 文件
    #[arg(long)]
    target: PathBuf,
    /// 手势脚本（JSON 数组：drop / delete）
    #[arg(long)]
    script: PathBuf,
    /// 会话配置（JSON）
    #[arg(long)]
    config: Option<PathBuf>,
    /// 结果文档输出路径
    #[arg(long)]
    output: Option<PathBuf>,
    /// 输出 debug 日志
    #[arg(long)]
    verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = read_text_file(path).with_context(|| format!("读取配置失败: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("配置格式错误: {}", path.display()))
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let mut session = MappingSession::new(config);
    println!("{}", STATUS_READY);

    session
        .load_source_file(&cli.source)
        .with_context(|| format!("加载源文档失败: {}", cli.source.display()))?;
    session
        .load_target_file(&cli.target)
        .with_context(|| format!("加载目标文档失败: {}", cli.target.display()))?;
    println!("{}", STATUS_LOADED);

    let script = read_text_file(&cli.script)
        .with_context(|| format!("读取手势脚本失败: {}", cli.script.display()))?;
    let gestures: Vec<Gesture> =
        serde_json::from_str(&script).with_context(|| format!("手势脚本格式错误: {}", cli.script.display()))?;

    for status in replay_gestures(&mut session, &gestures) {
        println!("{}", status);
    }

    let rows = mapping_rows(&session);
    if rows.is_empty() {
        println!("{}", STATUS_NO_MAPPINGS);
    }
    for row in &rows {
        println!("[{}] {}", row.index, row.label);
    }
    for conflict in session.conflicts() {
        println!("{}{}", STATUS_ERROR_PREFIX, conflict);
    }
    println!("{}", session.resultant_pretty()?);

    if let Some(output) = &cli.output {
        session
            .save_resultant_to_file(output)
            .with_context(|| format!("保存结果失败: {}", output.display()))?;
        println!("{}: {}", STATUS_SAVED, output.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 初始化日志输出
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = SubscriberBuilder::default().with_max_level(level).try_init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("执行失败: {:#}", err);
            eprintln!("{}{:#}", STATUS_ERROR_PREFIX, err);
            ExitCode::FAILURE
        }
    }
}
