// ==========================================
// 产能同步引擎 - 命令行入口
// ==========================================
// 用法:
//   capacity-sync sync <workbook> [week] [year] [db_path]
//   capacity-sync serve [db_path] [port]
//   capacity-sync config list [db_path]
//   capacity-sync config set <key> <value> [db_path]
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use capacity_sync::api::ConfigApi;
use capacity_sync::app::{self, get_default_db_path, AppState};
use capacity_sync::config::{ConfigManager, FixedSyncConfig, SyncConfigReader};
use capacity_sync::db::{ensure_schema, open_sqlite_connection};
use capacity_sync::domain::{SyncJobStatus, SyncRequest, SyncTriggerSource};
use capacity_sync::services::{spawn_scheduler, SyncJobRunner};
use std::sync::{Arc, Mutex};

const DEFAULT_PORT: u16 = 8080;

const USAGE: &str = "\
用法:
  capacity-sync sync <workbook> [week] [year] [db_path]
  capacity-sync serve [db_path] [port]
  capacity-sync config list [db_path]
  capacity-sync config set <key> <value> [db_path]";

#[tokio::main]
async fn main() -> Result<()> {
    capacity_sync::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", capacity_sync::APP_NAME, capacity_sync::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("sync") => run_sync(&args[1..]).await,
        Some("serve") => run_serve(&args[1..]).await,
        Some("config") => run_config(&args[1..]),
        _ => {
            eprintln!("{}", USAGE);
            bail!("未知命令");
        }
    }
}

fn arg(args: &[String], idx: usize) -> Option<&str> {
    args.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn db_path_arg(args: &[String], idx: usize) -> String {
    arg(args, idx).map(str::to_string).unwrap_or_else(get_default_db_path)
}

fn open_shared_connection(db_path: &str) -> Result<Arc<Mutex<rusqlite::Connection>>> {
    let conn = open_sqlite_connection(db_path).with_context(|| format!("无法打开数据库: {}", db_path))?;
    ensure_schema(&conn).context("数据库建表失败")?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 单次同步：命令行给出的工作簿覆盖库中配置，不写回配置
async fn run_sync(args: &[String]) -> Result<()> {
    let workbook = arg(args, 0).ok_or_else(|| anyhow!("缺少工作簿路径\n{}", USAGE))?;
    let week = arg(args, 1)
        .map(|s| s.parse::<u32>().with_context(|| format!("周号无效: {}", s)))
        .transpose()?;
    let year = arg(args, 2)
        .map(|s| s.parse::<i32>().with_context(|| format!("年份无效: {}", s)))
        .transpose()?;
    let db_path = db_path_arg(args, 3);
    tracing::info!(db_path = %db_path, workbook, "使用数据库");

    let conn = open_shared_connection(&db_path)?;
    let manager = ConfigManager::from_connection(conn.clone())?;
    let mut settings = manager.get_sync_settings().await?;
    settings.workbook_path = Some(workbook.to_string());

    let runner = SyncJobRunner::new(conn, Arc::new(FixedSyncConfig::new(settings)))?;
    let job = runner
        .submit_and_wait(SyncRequest { week, year }, SyncTriggerSource::Cli)
        .await?
        .ok_or_else(|| anyhow!("同步任务记录丢失"))?;

    match job.status {
        SyncJobStatus::Succeeded => {
            println!("{}", job.summary_json.unwrap_or_default());
            Ok(())
        }
        _ => bail!(
            "同步失败 (job_id={}): {}",
            job.job_id,
            job.error_message.unwrap_or_default()
        ),
    }
}

/// HTTP 服务 + 定时同步
async fn run_serve(args: &[String]) -> Result<()> {
    let db_path = db_path_arg(args, 0);
    let port = arg(args, 1)
        .map(|s| s.parse::<u16>().with_context(|| format!("端口无效: {}", s)))
        .transpose()?
        .unwrap_or(DEFAULT_PORT);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let interval = state.config_manager.get_sync_interval_minutes().await?;
    let _scheduler = spawn_scheduler(state.runner.clone(), interval);

    app::serve(state, port).await.context("HTTP 服务异常退出")
}

/// 配置查看与修改
fn run_config(args: &[String]) -> Result<()> {
    match arg(args, 0) {
        Some("list") => {
            let conn = open_shared_connection(&db_path_arg(args, 1))?;
            let api = ConfigApi::new(Arc::new(ConfigManager::from_connection(conn)?));
            for item in api.list_configs()? {
                println!("{} = {}", item.key, item.value.as_deref().unwrap_or("(默认)"));
            }
            println!("{}", serde_json::to_string_pretty(&api.effective_settings()?)?);
            Ok(())
        }
        Some("set") => {
            let key = arg(args, 1).ok_or_else(|| anyhow!("缺少配置键\n{}", USAGE))?;
            let value = args.get(2).ok_or_else(|| anyhow!("缺少配置值\n{}", USAGE))?;
            let conn = open_shared_connection(&db_path_arg(args, 3))?;
            let api = ConfigApi::new(Arc::new(ConfigManager::from_connection(conn)?));
            api.update_config(key, value)?;
            println!("{}", capacity_sync::i18n::t_with_args("config.updated", &[("key", key)]));
            Ok(())
        }
        _ => bail!("未知 config 子命令\n{}", USAGE),
    }
}
