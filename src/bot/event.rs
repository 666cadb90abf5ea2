use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::YueBotError;

/// 会话（群组或私聊）ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = YueBotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| YueBotError::invalid_user_id(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    MessageReply,
    MemberJoined,
    MemberLeft,
    Other,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Message => "message",
            EventKind::MessageReply => "message_reply",
            EventKind::MemberJoined => "member_joined",
            EventKind::MemberLeft => "member_left",
            EventKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// 会话网关推送过来的一条消息或事件，分发过程中只读
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub body: Option<String>,
    pub thread_id: ThreadId,
    pub message_id: MessageId,
    pub sender_id: Option<UserId>,
    pub kind: EventKind,
}

impl InboundEvent {
    /// 构造一条普通文本消息
    pub fn message(
        thread_id: ThreadId,
        message_id: MessageId,
        sender_id: UserId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            body: Some(body.into()),
            thread_id,
            message_id,
            sender_id: Some(sender_id),
            kind: EventKind::Message,
        }
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}
