use super::LiveError;
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// 传输层交给驱动的帧
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Closed { normal: bool, reason: Option<String> },
}

/// 一条已建立的推送连接
#[async_trait]
pub trait Transport: Send {
    /// `None` 表示连接在没有关闭帧的情况下结束
    async fn next_frame(&mut self) -> Option<Result<Frame, LiveError>>;
    async fn close(&mut self);
}

/// 建立连接的接缝，测试中可替换为内存实现
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, LiveError>;
}

/// 基于 tokio-tungstenite 的 WebSocket 连接器
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, LiveError> {
        let (stream, resp) = connect_async(url)
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        debug!("WebSocket 握手完成 [{}] {}", url, resp.status());
        Ok(Box::new(WsTransport { stream }))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_frame(&mut self) -> Option<Result<Frame, LiveError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(LiveError::Protocol(e.to_string()))),
            };
            match msg {
                Message::Text(text) => return Some(Ok(Frame::Text(text))),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(Frame::Text(text))),
                    Err(_) => warn!("忽略非 UTF-8 的二进制推送"),
                },
                Message::Close(frame) => {
                    let normal = frame
                        .as_ref()
                        .map(|f| f.code == CloseCode::Normal)
                        .unwrap_or(false);
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty());
                    return Some(Ok(Frame::Closed { normal, reason }));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("关闭 WebSocket 时出错: {}", e);
        }
    }
}
