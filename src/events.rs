//! 会话事件
//! 宿主应用订阅这些事件来处理跳转登录等界面行为

use tokio::sync::broadcast;
use tracing::debug;

/// 会话事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 令牌已刷新
    Refreshed,
    /// 会话不可恢复地失效（刷新失败），本地会话数据已清除
    Expired { reason: String, redirect_to: String },
    /// 主动登出
    LoggedOut,
}

impl SessionEvent {
    /// 获取事件类型名称
    pub fn event_type(&self) -> &str {
        match self {
            SessionEvent::Refreshed => "session_refreshed",
            SessionEvent::Expired { .. } => "session_expired",
            SessionEvent::LoggedOut => "session_logged_out",
        }
    }
}

/// 事件总线
#[derive(Clone)]
pub struct SessionEvents {
    /// 广播发送器（用于向所有订阅者发送事件）
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// 创建新的事件总线
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件（没有订阅者时直接丢弃）
    pub fn publish(&self, event: SessionEvent) {
        let event_type = event.event_type().to_string();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = %event_type, receivers, "Session event published"),
            Err(_) => debug!(event = %event_type, "Session event dropped, no subscribers"),
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(16)
    }
}
