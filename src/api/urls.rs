use url::Url;

/// 把 id 编码为单个路径段（`/`、`?`、空格等都会转义）
pub fn encode_segment(segment: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return segment.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(segment);
    }
    url.path().trim_start_matches('/').to_string()
}

/// 后端 REST 路径（相对 `SIMRULE_API_URL`）
pub const PATH_DATASETS: &str = "/datasets";
pub fn path_datasets_id(dataset_id: &str) -> String {
    format!("{}/{}", PATH_DATASETS, encode_segment(dataset_id))
}

pub const PATH_SCENARIOS: &str = "/scenarios";
pub fn path_scenarios_id(scenario_id: &str) -> String {
    format!("{}/{}", PATH_SCENARIOS, encode_segment(scenario_id))
}

pub const PATH_SIMULATIONS: &str = "/simulations";
pub fn path_simulations_id(simulation_id: &str) -> String {
    format!("{}/{}", PATH_SIMULATIONS, encode_segment(simulation_id))
}
pub fn path_simulations_id_cancel(simulation_id: &str) -> String {
    format!("{}/{}/cancel", PATH_SIMULATIONS, encode_segment(simulation_id))
}
pub fn path_simulations_id_results(simulation_id: &str) -> String {
    format!("{}/{}/results", PATH_SIMULATIONS, encode_segment(simulation_id))
}

pub const PATH_COVERAGE: &str = "/coverage";

pub const PATH_FACT_TYPES: &str = "/fact-types";
pub fn path_fact_types_schema(fact_type: &str) -> String {
    format!("{}/{}/schema", PATH_FACT_TYPES, encode_segment(fact_type))
}

/// 请求头
pub const HEADER_CORRELATION_ID: &str = "X-Correlation-ID";
pub const HEADER_USER_ID: &str = "X-User-ID";

/// 拼接基础地址与路径，避免出现重复或缺失的 `/`
pub fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
