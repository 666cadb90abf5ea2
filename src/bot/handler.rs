use anyhow::Result;
use async_trait::async_trait;

use crate::bot::action_box::ActionBox;
use crate::bot::event::{EventKind, InboundEvent};
use crate::bot::traits::ChatSession;

/// 处理器调用时拿到的上下文，只在本次调用期间有效
pub struct Context<'a> {
    pub session: &'a dyn ChatSession,
    pub event: &'a InboundEvent,
    pub args: &'a [String],
    pub action_box: &'a ActionBox,
}

/// 命令或事件处理器
#[async_trait]
pub trait Handler: Send + Sync {
    async fn run(&self, ctx: &Context<'_>) -> Result<()>;

    fn description(&self) -> &str {
        ""
    }

    /// 事件处理器可以只关心部分事件类型
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Command,
    Event,
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerKind::Command => write!(f, "command"),
            HandlerKind::Event => write!(f, "event"),
        }
    }
}
