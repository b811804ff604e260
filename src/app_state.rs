use crate::live::{ChannelState, LiveConsumer, LiveEvent};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Log(String),
    Message(String),
    Error(String),
    Live {
        simulation_id: String,
        event: LiveEvent,
    },
    ChannelState {
        simulation_id: String,
        state: ChannelState,
    },
    /// 自动重连耗尽，需要用户手动 `reconnect`
    ChannelLost {
        simulation_id: String,
    },
}

impl std::fmt::Display for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEvent::Log(msg) => write!(f, "[log] {}", msg),
            AppEvent::Message(msg) => write!(f, "{}", msg),
            AppEvent::Error(msg) => write!(f, "✗ {}", msg),
            AppEvent::Live {
                simulation_id,
                event,
            } => match event {
                LiveEvent::Progress {
                    progress,
                    completed_scenarios,
                    total_scenarios,
                    ..
                } => {
                    // 后端可能推送 0..1 的比例或 0..100 的百分比
                    let pct = if *progress <= 1.0 {
                        progress * 100.0
                    } else {
                        *progress
                    };
                    match (completed_scenarios, total_scenarios) {
                        (Some(done), Some(total)) => write!(
                            f,
                            "[{}] 进度 {:.0}% ({}/{})",
                            simulation_id, pct, done, total
                        ),
                        _ => write!(f, "[{}] 进度 {:.0}%", simulation_id, pct),
                    }
                }
                LiveEvent::ScenarioComplete {
                    scenario_id,
                    status,
                    ..
                } => write!(
                    f,
                    "[{}] 场景 {} 完成: {}",
                    simulation_id,
                    scenario_id,
                    status.as_deref().unwrap_or("-")
                ),
                LiveEvent::SimulationComplete { status, .. } => write!(
                    f,
                    "[{}] ✓ 模拟结束: {}",
                    simulation_id,
                    status.as_deref().unwrap_or("COMPLETED")
                ),
                LiveEvent::Error { message, .. } => {
                    write!(f, "[{}] ✗ 模拟出错: {}", simulation_id, message)
                }
            },
            AppEvent::ChannelState {
                simulation_id,
                state,
            } => write!(f, "[{}] 实时通道: {}", simulation_id, state),
            AppEvent::ChannelLost { simulation_id } => write!(
                f,
                "[{}] ⚠ 实时通道重连失败，输入 `reconnect {}` 重试",
                simulation_id, simulation_id
            ),
        }
    }
}

/// 把实时通道回调转成 `AppEvent` 送入事件队列
pub struct EventForwarder {
    simulation_id: String,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventForwarder {
    pub fn new(simulation_id: impl Into<String>, tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            simulation_id: simulation_id.into(),
            tx,
        }
    }
}

impl LiveConsumer for EventForwarder {
    fn on_event(&self, event: LiveEvent) {
        let _ = self.tx.send(AppEvent::Live {
            simulation_id: self.simulation_id.clone(),
            event,
        });
    }

    fn on_state_change(&self, state: ChannelState) {
        let _ = self.tx.send(AppEvent::ChannelState {
            simulation_id: self.simulation_id.clone(),
            state,
        });
    }

    fn on_permanent_failure(&self) {
        let _ = self.tx.send(AppEvent::ChannelLost {
            simulation_id: self.simulation_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarder_tags_events_with_simulation_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let fwd = EventForwarder::new("sim-1", tx);
        fwd.on_state_change(ChannelState::Connected);
        fwd.on_event(LiveEvent::Error {
            simulation_id: None,
            message: "boom".to_string(),
        });
        fwd.on_permanent_failure();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.to_string(), "[sim-1] 实时通道: connected");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.to_string(), "[sim-1] ✗ 模拟出错: boom");
        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::ChannelLost { simulation_id } if simulation_id == "sim-1"
        ));
    }

    #[test]
    fn progress_renders_percentage() {
        let evt = AppEvent::Live {
            simulation_id: "s".to_string(),
            event: LiveEvent::Progress {
                simulation_id: None,
                progress: 0.5,
                completed_scenarios: Some(1),
                total_scenarios: Some(2),
                message: None,
            },
        };
        assert_eq!(evt.to_string(), "[s] 进度 50% (1/2)");
    }
}
