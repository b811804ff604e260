use super::channel::{LiveChannel, LiveConsumer};
use super::state::{ChannelState, ReconnectPolicy};
use super::transport::Connector;
use super::LiveError;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// 按模拟 id 管理实时通道，同一 id 同时最多一个活动连接
pub struct ChannelRegistry {
    ws_url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    channels: HashMap<String, LiveChannel>,
}

impl ChannelRegistry {
    pub fn new(
        ws_url: impl Into<String>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            connector,
            policy,
            channels: HashMap::new(),
        }
    }

    /// `ws_url?simulationId=<id>`
    pub fn channel_url(&self, simulation_id: &str) -> Result<String, LiveError> {
        let mut url =
            Url::parse(&self.ws_url).map_err(|e| LiveError::InvalidUrl(format!("{}: {}", self.ws_url, e)))?;
        url.query_pairs_mut()
            .append_pair("simulationId", simulation_id);
        Ok(url.to_string())
    }

    /// 建立通道；若该 id 已有通道，先等旧通道完全关闭再启动新通道
    pub async fn connect(
        &mut self,
        simulation_id: &str,
        consumer: Arc<dyn LiveConsumer>,
    ) -> Result<&LiveChannel, LiveError> {
        let url = self.channel_url(simulation_id)?;
        if let Some(mut previous) = self.channels.remove(simulation_id) {
            info!("{} 被替换，先关闭旧连接", previous);
            previous.shutdown().await;
        }

        let channel = LiveChannel::spawn(
            simulation_id,
            url,
            self.connector.clone(),
            self.policy,
            consumer,
        );
        Ok(self
            .channels
            .entry(simulation_id.to_string())
            .or_insert(channel))
    }

    pub async fn disconnect(&mut self, simulation_id: &str) -> bool {
        match self.channels.remove(simulation_id) {
            Some(mut channel) => {
                channel.shutdown().await;
                info!("{} 已断开", channel);
                true
            }
            None => false,
        }
    }

    pub async fn disconnect_all(&mut self) {
        for (_, mut channel) in self.channels.drain() {
            channel.shutdown().await;
        }
    }

    pub fn reconnect(&self, simulation_id: &str) -> bool {
        match self.channels.get(simulation_id) {
            Some(channel) => {
                channel.reconnect();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, simulation_id: &str) -> Option<&LiveChannel> {
        self.channels.get(simulation_id)
    }

    pub fn state(&self, simulation_id: &str) -> Option<ChannelState> {
        self.get(simulation_id).map(LiveChannel::state)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
