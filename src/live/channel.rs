use super::message::{parse_message, LiveEvent};
use super::state::{Action, ChannelMachine, ChannelState, ReconnectPolicy};
use super::transport::{Connector, Frame, Transport};
use super::LiveError;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// 推送事件的接收方。回调在驱动任务中按到达顺序同步调用。
pub trait LiveConsumer: Send + Sync {
    fn on_event(&self, event: LiveEvent);

    fn on_state_change(&self, _state: ChannelState) {}

    /// 自动重连次数耗尽时调用一次
    fn on_permanent_failure(&self) {}
}

#[derive(Debug)]
enum Control {
    Reconnect,
    Disconnect,
}

/// 一个模拟的实时通道句柄，后台驱动任务负责连接与重连
pub struct LiveChannel {
    simulation_id: String,
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ChannelState>,
    task: Option<JoinHandle<()>>,
}

impl LiveChannel {
    pub fn spawn(
        simulation_id: impl Into<String>,
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        consumer: Arc<dyn LiveConsumer>,
    ) -> Self {
        let simulation_id = simulation_id.into();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);

        let driver = Driver {
            simulation_id: simulation_id.clone(),
            url: url.into(),
            connector,
            consumer,
            machine: ChannelMachine::new(policy),
            state_tx,
            control: control_rx,
        };
        let task = tokio::spawn(driver.run());

        Self {
            simulation_id,
            control: control_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// 重置重试计数并立即重新连接
    pub fn reconnect(&self) {
        if self.control.send(Control::Reconnect).is_err() {
            warn!("{} 驱动任务已结束，忽略重连请求", self);
        }
    }

    /// 关闭连接并等待驱动任务退出，返回后不会再有任何回调
    pub async fn shutdown(&mut self) {
        let _ = self.control.send(Control::Disconnect);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("{} 驱动任务异常退出: {}", self, e);
                }
            }
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Display for LiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<LiveChannel [{}]>", self.simulation_id)
    }
}

impl std::fmt::Debug for LiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<LiveChannel [{}] {}>", self.simulation_id, self.state())
    }
}

enum Outcome<T> {
    Control(Option<Control>),
    Done(T),
}

struct Driver {
    simulation_id: String,
    url: String,
    connector: Arc<dyn Connector>,
    consumer: Arc<dyn LiveConsumer>,
    machine: ChannelMachine,
    state_tx: watch::Sender<ChannelState>,
    control: mpsc::UnboundedReceiver<Control>,
}

impl Driver {
    async fn run(mut self) {
        let mut action = self.machine.connect();
        loop {
            self.publish();
            action = match action {
                Action::Open => self.open().await,
                Action::Retry { attempt, delay } => {
                    info!(
                        "[{}] {:?} 后进行第 {}/{} 次重连",
                        self.simulation_id,
                        delay,
                        attempt,
                        self.machine.policy().max_attempts
                    );
                    self.wait_retry(delay).await
                }
                Action::GiveUp => {
                    error!(
                        "✗ [{}] 重连 {} 次均失败，停止自动重连",
                        self.simulation_id,
                        self.machine.policy().max_attempts
                    );
                    self.consumer.on_permanent_failure();
                    self.idle().await
                }
                Action::Idle => self.idle().await,
                Action::Stop => break,
            };
        }
        debug!("[{}] 实时通道驱动任务退出", self.simulation_id);
    }

    /// 只在状态真正变化时通知消费者
    fn publish(&self) {
        let next = self.machine.state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!("[{}] 状态 -> {}", self.simulation_id, next);
            self.consumer.on_state_change(next);
        }
    }

    fn on_control(&mut self, control: Option<Control>) -> Action {
        match control {
            Some(Control::Reconnect) => {
                info!("[{}] 手动重连", self.simulation_id);
                self.machine.manual_reconnect()
            }
            Some(Control::Disconnect) | None => self.machine.disconnect(),
        }
    }

    async fn idle(&mut self) -> Action {
        let control = self.control.recv().await;
        self.on_control(control)
    }

    async fn wait_retry(&mut self, delay: std::time::Duration) -> Action {
        let outcome = tokio::select! {
            biased;
            control = self.control.recv() => Outcome::Control(control),
            _ = tokio::time::sleep(delay) => Outcome::Done(()),
        };
        match outcome {
            Outcome::Control(control) => self.on_control(control),
            Outcome::Done(()) => self.machine.retry_due(),
        }
    }

    async fn open(&mut self) -> Action {
        let timeout = self.machine.policy().connect_timeout;
        let connect = tokio::time::timeout(timeout, self.connector.connect(&self.url));
        let outcome = tokio::select! {
            biased;
            control = self.control.recv() => Outcome::Control(control),
            result = connect => Outcome::Done(result),
        };

        let result = match outcome {
            Outcome::Control(control) => return self.on_control(control),
            Outcome::Done(Ok(result)) => result,
            Outcome::Done(Err(_)) => Err(LiveError::Timeout(timeout)),
        };

        match result {
            Ok(transport) => {
                self.machine.opened();
                self.publish();
                info!("✓ [{}] 实时通道已连接", self.simulation_id);
                self.pump(transport).await
            }
            Err(e) => {
                warn!("⚠ [{}] 实时通道连接失败: {}", self.simulation_id, e);
                self.machine.failed()
            }
        }
    }

    async fn pump(&mut self, mut transport: Box<dyn Transport>) -> Action {
        loop {
            let outcome = tokio::select! {
                biased;
                control = self.control.recv() => Outcome::Control(control),
                frame = transport.next_frame() => Outcome::Done(frame),
            };
            match outcome {
                Outcome::Control(control) => {
                    transport.close().await;
                    return self.on_control(control);
                }
                Outcome::Done(Some(Ok(Frame::Text(text)))) => {
                    if let Some(event) = parse_message(&text) {
                        self.consumer.on_event(event);
                    }
                }
                Outcome::Done(Some(Ok(Frame::Closed { normal: true, .. }))) => {
                    info!("[{}] 服务端正常关闭连接", self.simulation_id);
                    return self.machine.closed_normally();
                }
                Outcome::Done(Some(Ok(Frame::Closed { normal: false, reason }))) => {
                    warn!(
                        "⚠ [{}] 连接异常关闭: {}",
                        self.simulation_id,
                        reason.unwrap_or_else(|| "-".to_string())
                    );
                    return self.machine.failed();
                }
                Outcome::Done(Some(Err(e))) => {
                    warn!("⚠ [{}] 连接出错: {}", self.simulation_id, e);
                    transport.close().await;
                    return self.machine.failed();
                }
                Outcome::Done(None) => {
                    warn!("⚠ [{}] 连接意外中断", self.simulation_id);
                    return self.machine.failed();
                }
            }
        }
    }
}
