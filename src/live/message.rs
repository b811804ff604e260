use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 后端推送的模拟事件，按 `type` 字段区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        #[serde(default)]
        simulation_id: Option<String>,
        #[serde(default)]
        progress: f64,
        #[serde(default)]
        completed_scenarios: Option<u32>,
        #[serde(default)]
        total_scenarios: Option<u32>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ScenarioComplete {
        #[serde(default)]
        simulation_id: Option<String>,
        scenario_id: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        result: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    SimulationComplete {
        #[serde(default)]
        simulation_id: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        summary: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        #[serde(default)]
        simulation_id: Option<String>,
        message: String,
    },
}

impl LiveEvent {
    /// 模拟已结束（完成或出错）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LiveEvent::SimulationComplete { .. } | LiveEvent::Error { .. }
        )
    }
}

/// 解析一条文本消息；无法识别时记录警告并返回 `None`
pub fn parse_message(text: &str) -> Option<LiveEvent> {
    match serde_json::from_str::<LiveEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            let preview: String = text.chars().take(120).collect();
            warn!("丢弃无法解析的推送消息: {} ({})", e, preview);
            None
        }
    }
}
