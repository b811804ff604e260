use anyhow::Context;
use chrono::Local;
use log::{info, warn};
use simrule::api::ApiClient;
use simrule::app_service::AppService;
use simrule::commands::{help_text, AppCommand};
use simrule::drafts::{establish_connection, DraftStore};
use simrule::live::{ChannelRegistry, ReconnectPolicy, WsConnector};
use simrule::{AppConfig, AppEvent};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

fn init_logging(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(dir) = log_dir {
        let ts = Local::now().format("%Y%m%d-%H%M%S").to_string();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("无法创建日志目录: {}", dir.display()))?;
        let log_file = std::fs::File::create(dir.join(format!("app-{}.log", ts)))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    builder
        .filter_level(log::LevelFilter::Warn)
        .filter_module("simrule", log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Error)
        .filter_module("sea_orm", log::LevelFilter::Error)
        .init();
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 加载 .env（不存在时使用系统环境变量）
    let env_file = dotenv::dotenv().ok();
    let config = AppConfig::from_env();
    init_logging(config.log_dir.as_deref())?;

    match env_file {
        Some(path) => info!("✓ 找到 .env 文件: {}", path.display()),
        None => info!("⚠ 未找到 .env 文件，从系统环境变量读取"),
    }
    info!(
        "API: {} | WS: {} | 超时 {:?}",
        config.api_url, config.ws_url, config.request_timeout
    );

    let api = Arc::new(ApiClient::new(&config).context("无法创建 HTTP 客户端")?);

    // 草稿库不可用时仍可继续工作
    let drafts = match establish_connection(&config.drafts_db_url).await {
        Ok(db) => Some(DraftStore::new(db)),
        Err(e) => {
            warn!("⚠ 草稿库不可用: {}", e);
            None
        }
    };

    let registry = ChannelRegistry::new(
        config.ws_url.clone(),
        Arc::new(WsConnector),
        ReconnectPolicy::default(),
    );

    // 核心 Channel：命令进，事件出
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<AppCommand>();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<AppEvent>();

    let printer = tokio::spawn(async move {
        while let Some(evt) = evt_rx.recv().await {
            match evt {
                AppEvent::Error(_) | AppEvent::ChannelLost { .. } => eprintln!("{}", evt),
                _ => println!("{}", evt),
            }
        }
    });

    // 单后台任务模型 (Actor)
    let service = AppService::new(api, registry, drafts, evt_tx);
    let cancel = service.cancellation();
    let actor = tokio::spawn(service.run(cmd_rx));

    // Ctrl-C：中止进行中的请求并退出
    {
        let cmd_tx = cmd_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
                let _ = cmd_tx.send(AppCommand::Quit);
            }
        });
    }

    println!("{}", help_text());
    // 交互输入用独立线程阻塞读取，避免阻塞运行时退出
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let Ok(cmd) = line.parse::<AppCommand>() else {
                continue;
            };
            if cmd_tx.send(cmd).is_err() {
                return;
            }
        }
        // stdin 结束同样视为退出
        let _ = cmd_tx.send(AppCommand::Quit);
    });

    actor.await.context("命令处理任务异常退出")?;
    let _ = printer.await;
    Ok(())
}
