use crate::api::dto::SimulationRequest;
use crate::api::{ApiClient, ApiError};
use crate::app_state::{AppEvent, EventForwarder};
use crate::commands::{help_text, AppCommand, DEFAULT_PAGE_SIZE};
use crate::dataset::{upload_file, DatasetIngestor, IngestOptions};
use crate::drafts::DraftStore;
use crate::live::ChannelRegistry;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DRAFT_KIND_SIMULATION: &str = "simulation";
const DRAFT_PENDING: &str = "pending";

/// 模拟已提交，删除待提交草稿；失败只记录日志
async fn clear_pending_draft(store: &DraftStore) -> bool {
    match store.clear(DRAFT_KIND_SIMULATION, DRAFT_PENDING).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!("清除模拟草稿失败: {}", e);
            false
        }
    }
}

/// 后台命令执行者，独占实时通道注册表
pub struct AppService {
    api: Arc<ApiClient>,
    ingestor: DatasetIngestor,
    registry: ChannelRegistry,
    drafts: Option<DraftStore>,
    evt_tx: mpsc::UnboundedSender<AppEvent>,
    cancel: CancellationToken,
}

impl AppService {
    pub fn new(
        api: Arc<ApiClient>,
        registry: ChannelRegistry,
        drafts: Option<DraftStore>,
        evt_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            api,
            ingestor: DatasetIngestor::default(),
            registry,
            drafts,
            evt_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// 取消后所有进行中的请求立即返回 `Aborted`
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.evt_tx.send(event);
    }

    fn report(&self, what: &str, err: impl std::fmt::Display) {
        self.emit(AppEvent::Error(format!("{}: {}", what, err)));
    }

    /// 启动时检查上次未提交的模拟草稿
    pub async fn restore_drafts(&self) {
        let Some(store) = &self.drafts else { return };
        if let Err(e) = store.purge_stale().await {
            warn!("清理过期草稿失败: {}", e);
        }
        match store
            .load::<SimulationRequest>(DRAFT_KIND_SIMULATION, DRAFT_PENDING)
            .await
        {
            Ok(Some(draft)) => self.emit(AppEvent::Message(format!(
                "发现未提交的模拟草稿: {} (run {})",
                draft.name,
                draft.scenario_ids.join(" ")
            ))),
            Ok(None) => {}
            Err(e) => warn!("读取模拟草稿失败: {}", e),
        }
    }

    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<AppCommand>) {
        self.restore_drafts().await;
        while let Some(cmd) = cmd_rx.recv().await {
            if cmd == AppCommand::Quit {
                self.emit(AppEvent::Message("收到退出命令".to_string()));
                break;
            }
            self.handle(cmd).await;
        }
        self.registry.disconnect_all().await;
        info!("命令处理任务退出");
    }

    pub async fn handle(&mut self, cmd: AppCommand) {
        let cancel = self.cancel.clone();
        match cmd {
            AppCommand::Upload {
                path,
                name,
                fact_type,
            } => {
                self.emit(AppEvent::Message(format!("正在解析: {}", path.display())));
                let options = IngestOptions {
                    name,
                    fact_type: fact_type.unwrap_or_default(),
                    ..Default::default()
                };
                match upload_file(&self.api, &self.ingestor, &path, options, Some(&cancel)).await {
                    Ok(dataset) => self.emit(AppEvent::Message(format!(
                        "✓ 数据集已上传: {} (id: {}, {} 条记录)",
                        dataset.name,
                        dataset.id,
                        dataset.records.len()
                    ))),
                    Err(e) => self.report("上传失败", e),
                }
            }
            AppCommand::Datasets { page } => {
                match self
                    .api
                    .list_datasets_page(page, DEFAULT_PAGE_SIZE, Some(&cancel))
                    .await
                {
                    Ok(page) => {
                        let mut lines = vec![format!(
                            "数据集 第 {}/{} 页 (共 {} 个)",
                            page.page,
                            page.total_pages.max(1),
                            page.total
                        )];
                        lines.extend(page.items.iter().map(|d| {
                            format!(
                                "  {}  {} [{}] {} 条 v{}",
                                d.id,
                                d.name,
                                d.format,
                                d.records.len(),
                                d.version
                            )
                        }));
                        self.emit(AppEvent::Message(lines.join("\n")));
                    }
                    Err(e) => self.report("获取数据集失败", e),
                }
            }
            AppCommand::Scenarios => match self.api.list_scenarios(Some(&cancel)).await {
                Ok(scenarios) => {
                    let mut lines = vec![format!("场景 (共 {} 个)", scenarios.len())];
                    lines.extend(scenarios.iter().map(|s| {
                        format!(
                            "  {}  {} [{}]",
                            s.id.as_deref().unwrap_or("-"),
                            s.name,
                            s.fact_type
                        )
                    }));
                    self.emit(AppEvent::Message(lines.join("\n")));
                }
                Err(e) => self.report("获取场景失败", e),
            },
            AppCommand::Run { scenario_ids } => self.run_simulation(scenario_ids, &cancel).await,
            AppCommand::Watch { simulation_id } => self.watch(&simulation_id).await,
            AppCommand::Unwatch { simulation_id } => {
                if self.registry.disconnect(&simulation_id).await {
                    self.emit(AppEvent::Message(format!("已取消订阅: {}", simulation_id)));
                } else {
                    self.emit(AppEvent::Error(format!("未订阅: {}", simulation_id)));
                }
            }
            AppCommand::Reconnect { simulation_id } => {
                if !self.registry.reconnect(&simulation_id) {
                    self.emit(AppEvent::Error(format!("未订阅: {}", simulation_id)));
                }
            }
            AppCommand::Cancel { simulation_id } => {
                match self.api.cancel_simulation(&simulation_id, Some(&cancel)).await {
                    Ok(()) => self.emit(AppEvent::Message(format!("已请求取消模拟: {}", simulation_id))),
                    Err(e) => self.report("取消模拟失败", e),
                }
            }
            AppCommand::Coverage => match self.api.get_coverage(Some(&cancel)).await {
                Ok(report) => {
                    let mut lines = vec![format!(
                        "规则覆盖率 {:.1}% ({}/{})",
                        report.coverage_percentage, report.covered_rules, report.total_rules
                    )];
                    lines.extend(
                        report
                            .uncovered()
                            .map(|r| format!("  未覆盖: {}", r.rule_name)),
                    );
                    self.emit(AppEvent::Message(lines.join("\n")));
                }
                Err(e) => self.report("获取覆盖率失败", e),
            },
            AppCommand::Help => self.emit(AppEvent::Message(help_text().to_string())),
            AppCommand::Quit => {}
            AppCommand::Unknown(msg) => {
                if !msg.is_empty() {
                    self.emit(AppEvent::Error(msg));
                }
            }
        }
    }

    async fn run_simulation(&mut self, scenario_ids: Vec<String>, cancel: &CancellationToken) {
        let request = SimulationRequest {
            name: format!("cli-{}", chrono::Local::now().format("%Y%m%d-%H%M%S")),
            scenario_ids,
            description: None,
        };
        if let Some(store) = &self.drafts {
            if let Err(e) = store
                .save(DRAFT_KIND_SIMULATION, DRAFT_PENDING, &request)
                .await
            {
                warn!("保存模拟草稿失败: {}", e);
            }
        }

        match self.api.start_simulation(&request, Some(cancel)).await {
            Ok(sim) => {
                if let Some(store) = &self.drafts {
                    clear_pending_draft(store).await;
                }
                self.emit(AppEvent::Message(format!(
                    "✓ 模拟已启动: {} ({:?})",
                    sim.id, sim.status
                )));
                self.watch(&sim.id).await;
            }
            Err(ApiError::Aborted) => self.emit(AppEvent::Log("启动模拟已取消".to_string())),
            Err(e) => self.report("启动模拟失败", e),
        }
    }

    async fn watch(&mut self, simulation_id: &str) {
        let consumer = Arc::new(EventForwarder::new(simulation_id, self.evt_tx.clone()));
        let connected = self
            .registry
            .connect(simulation_id, consumer)
            .await
            .map(|_| ());
        if let Err(e) = connected {
            self.report("订阅失败", e);
        }
    }
}
