use crate::dataset::FieldMapping;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fact_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    /// 内联测试数据（未关联数据集时使用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_results: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub name: String,
    pub scenario_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl SimulationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SimulationStatus::Completed | SimulationStatus::Failed | SimulationStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: SimulationStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub scenario_ids: Vec<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario_id: String,
    #[serde(default)]
    pub scenario_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub rules_fired: Vec<String>,
    #[serde(default)]
    pub actual_results: Option<Value>,
    #[serde(default)]
    pub expected_results: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.status.eq_ignore_ascii_case("PASSED") || self.status.eq_ignore_ascii_case("SUCCESS")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCoverage {
    pub rule_name: String,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub fire_count: u64,
    #[serde(default)]
    pub covered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub total_rules: u64,
    pub covered_rules: u64,
    #[serde(default)]
    pub coverage_percentage: f64,
    #[serde(default)]
    pub rules: Vec<RuleCoverage>,
}

impl CoverageReport {
    pub fn uncovered(&self) -> impl Iterator<Item = &RuleCoverage> {
        self.rules.iter().filter(|r| !r.covered)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FactField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// 事实类型结构（规则检查器提供）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FactSchema {
    pub fact_type: String,
    #[serde(default)]
    pub fields: Vec<FactField>,
}

impl FactSchema {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}
