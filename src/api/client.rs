use super::dto::{CoverageReport, FactSchema, Scenario, ScenarioResult, Simulation, SimulationRequest};
use super::error::{extract_error_message, ApiError};
use super::pagination::{paginate, Page};
use super::urls::*;
use crate::config::AppConfig;
use crate::dataset::{Dataset, DatasetPayload};
use log::{debug, info, warn};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct RawResponse {
    status: StatusCode,
    body: String,
}

/// 规则引擎后端的 HTTP 客户端
///
/// 每个请求都带一个新的关联 ID（`X-Correlation-ID`），配置了用户时带 `X-User-ID`。
/// 请求与调用方的取消令牌、内部超时计时器竞速，任一先到即放弃请求。
pub struct ApiClient {
    client: Client,
    base_url: String,
    user_id: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent("simrule/0.1");

        if let Some(raw) = config.proxy.as_deref() {
            let url = if raw.contains("://") {
                raw.to_string()
            } else {
                format!("socks5h://{}", raw)
            };
            let proxy = reqwest::Proxy::all(&url).map_err(|e| ApiError::Network(e.to_string()))?;
            builder = builder.proxy(proxy);
        } else {
            // 只认 SIMRULE_PROXY，不读取系统代理变量
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            user_id: config.user_id.clone(),
            timeout: config.request_timeout,
        })
    }

    /// 只指定地址和超时（测试与脚本使用）
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let config = AppConfig {
            api_url: base_url.to_string(),
            request_timeout: timeout,
            ..AppConfig::default()
        };
        Self::new(&config)
    }

    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse, ApiError> {
        let url = join(&self.base_url, path);
        let correlation_id = Uuid::new_v4().to_string();

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(HEADER_CORRELATION_ID, &correlation_id);
        if let Some(user_id) = &self.user_id {
            request = request.header(HEADER_USER_ID, user_id);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let exchange = async {
            let resp = request
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            let status = resp.status();
            let echoed = resp
                .headers()
                .get(HEADER_CORRELATION_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp
                .text()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            Ok::<_, ApiError>((RawResponse { status, body }, echoed))
        };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let (raw, echoed) = tokio::select! {
            biased;
            _ = cancelled => {
                debug!("{} {} {} 已取消 [{}]", self, method, url, correlation_id);
                return Err(ApiError::Aborted);
            }
            result = exchange => result?,
            _ = tokio::time::sleep(self.timeout) => {
                warn!("{} {} {} 超时 ({:?}) [{}]", self, method, url, self.timeout, correlation_id);
                return Err(ApiError::Timeout(self.timeout));
            }
        };

        if !raw.status.is_success() {
            let fallback = raw.status.canonical_reason().unwrap_or("request failed");
            let (message, details) = extract_error_message(&raw.body, fallback);
            warn!(
                "{} {} {} 失败 [{}]: {}",
                self,
                method,
                url,
                raw.status.as_u16(),
                message
            );
            return Err(ApiError::Http {
                status: raw.status.as_u16(),
                message,
                details,
                correlation_id: echoed.or(Some(correlation_id)),
            });
        }

        info!("{} {}(...) [{}] {}", self, method, url, raw.status.as_u16());
        Ok(raw)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, ApiError> {
        let raw = self.send(method, path, body, cancel).await?;
        serde_json::from_str(&raw.body).map_err(|e| {
            ApiError::InvalidResponse(format!("json parse failed: {}, raw={}", e, raw.body))
        })
    }

    fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
    }

    // ---- 数据集 ----

    pub async fn list_datasets(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Dataset>, ApiError> {
        self.send_json(Method::GET, PATH_DATASETS, None, cancel).await
    }

    /// 全量拉取后在本地切片
    pub async fn list_datasets_page(
        &self,
        page: usize,
        page_size: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<Page<Dataset>, ApiError> {
        let all = self.list_datasets(cancel).await?;
        Ok(paginate(all, page, page_size))
    }

    pub async fn get_dataset(
        &self,
        dataset_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Dataset, ApiError> {
        self.send_json(Method::GET, &path_datasets_id(dataset_id), None, cancel)
            .await
    }

    pub async fn create_dataset(
        &self,
        payload: &DatasetPayload,
        cancel: Option<&CancellationToken>,
    ) -> Result<Dataset, ApiError> {
        let body = Self::encode(payload)?;
        self.send_json(Method::POST, PATH_DATASETS, Some(body), cancel)
            .await
    }

    pub async fn delete_dataset(
        &self,
        dataset_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ApiError> {
        self.send(Method::DELETE, &path_datasets_id(dataset_id), None, cancel)
            .await?;
        Ok(())
    }

    // ---- 场景 ----

    pub async fn list_scenarios(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Scenario>, ApiError> {
        self.send_json(Method::GET, PATH_SCENARIOS, None, cancel)
            .await
    }

    pub async fn get_scenario(
        &self,
        scenario_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Scenario, ApiError> {
        self.send_json(Method::GET, &path_scenarios_id(scenario_id), None, cancel)
            .await
    }

    pub async fn create_scenario(
        &self,
        scenario: &Scenario,
        cancel: Option<&CancellationToken>,
    ) -> Result<Scenario, ApiError> {
        let body = Self::encode(scenario)?;
        self.send_json(Method::POST, PATH_SCENARIOS, Some(body), cancel)
            .await
    }

    pub async fn update_scenario(
        &self,
        scenario_id: &str,
        scenario: &Scenario,
        cancel: Option<&CancellationToken>,
    ) -> Result<Scenario, ApiError> {
        let body = Self::encode(scenario)?;
        self.send_json(Method::PUT, &path_scenarios_id(scenario_id), Some(body), cancel)
            .await
    }

    pub async fn delete_scenario(
        &self,
        scenario_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ApiError> {
        self.send(Method::DELETE, &path_scenarios_id(scenario_id), None, cancel)
            .await?;
        Ok(())
    }

    // ---- 模拟 ----

    pub async fn start_simulation(
        &self,
        request: &SimulationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Simulation, ApiError> {
        let body = Self::encode(request)?;
        self.send_json(Method::POST, PATH_SIMULATIONS, Some(body), cancel)
            .await
    }

    pub async fn get_simulation(
        &self,
        simulation_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Simulation, ApiError> {
        self.send_json(Method::GET, &path_simulations_id(simulation_id), None, cancel)
            .await
    }

    pub async fn cancel_simulation(
        &self,
        simulation_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ApiError> {
        self.send(
            Method::POST,
            &path_simulations_id_cancel(simulation_id),
            None,
            cancel,
        )
        .await?;
        Ok(())
    }

    pub async fn get_simulation_results(
        &self,
        simulation_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<ScenarioResult>, ApiError> {
        self.send_json(
            Method::GET,
            &path_simulations_id_results(simulation_id),
            None,
            cancel,
        )
        .await
    }

    // ---- 覆盖率 / 事实类型 ----

    pub async fn get_coverage(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<CoverageReport, ApiError> {
        self.send_json(Method::GET, PATH_COVERAGE, None, cancel)
            .await
    }

    pub async fn get_fact_schema(
        &self,
        fact_type: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<FactSchema, ApiError> {
        self.send_json(Method::GET, &path_fact_types_schema(fact_type), None, cancel)
            .await
    }
}

impl std::fmt::Display for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ApiClient [{}]>", self.base_url)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ApiClient [{}]>", self.base_url)
    }
}
