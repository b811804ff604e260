use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Error => "error",
        };
        f.write_str(s)
    }
}

/// 重连策略：指数退避 `base_delay * 2^(attempt-1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ReconnectPolicy {
    /// `attempt` 从 1 开始
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// 状态机给驱动层的下一步指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 发起连接
    Open,
    /// 等待 `delay` 后进行第 `attempt` 次重连
    Retry { attempt: u32, delay: Duration },
    /// 重试次数耗尽，通知一次永久失败
    GiveUp,
    /// 等待外部指令
    Idle,
    /// 会话结束
    Stop,
}

/// 实时通道的纯状态机，不涉及计时器和套接字
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    policy: ReconnectPolicy,
    state: ChannelState,
    attempts: u32,
    exhausted: bool,
    closed: bool,
}

impl ChannelMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ChannelState::Disconnected,
            attempts: 0,
            exhausted: false,
            closed: false,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn connect(&mut self) -> Action {
        if self.closed
            || matches!(
                self.state,
                ChannelState::Connecting | ChannelState::Connected
            )
        {
            return Action::Idle;
        }
        self.state = ChannelState::Connecting;
        Action::Open
    }

    /// 连接建立成功，重试计数清零
    pub fn opened(&mut self) {
        if self.state == ChannelState::Connecting {
            self.state = ChannelState::Connected;
            self.attempts = 0;
            self.exhausted = false;
        }
    }

    /// 对端正常关闭（1000），不自动重连
    pub fn closed_normally(&mut self) -> Action {
        self.state = ChannelState::Disconnected;
        Action::Idle
    }

    /// 连接失败、协议错误、超时或异常关闭
    pub fn failed(&mut self) -> Action {
        if self.closed {
            self.state = ChannelState::Disconnected;
            return Action::Idle;
        }
        self.state = ChannelState::Error;
        if self.exhausted {
            return Action::Idle;
        }
        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            Action::Retry {
                attempt: self.attempts,
                delay: self.policy.delay_for(self.attempts),
            }
        } else {
            self.exhausted = true;
            Action::GiveUp
        }
    }

    /// 退避等待结束
    pub fn retry_due(&mut self) -> Action {
        if self.closed || self.exhausted {
            return Action::Idle;
        }
        self.state = ChannelState::Connecting;
        Action::Open
    }

    /// 手动重连：重置计数后从 connecting 重新开始
    pub fn manual_reconnect(&mut self) -> Action {
        self.closed = false;
        self.exhausted = false;
        self.attempts = 0;
        self.state = ChannelState::Connecting;
        Action::Open
    }

    /// 主动断开是终态：计数置满，之后不再自动重连
    pub fn disconnect(&mut self) -> Action {
        self.closed = true;
        self.attempts = self.policy.max_attempts;
        self.state = ChannelState::Disconnected;
        Action::Stop
    }
}
