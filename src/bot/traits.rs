use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::bot::event::{MessageId, ThreadId, UserId};
use crate::error::Result;

/// 抽象聊天会话的能力，Telegram 实现见 `bot::telegram`，测试时可以 mock
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// 发送消息，`reply_to` 不为空时作为对该消息的回复
    async fn send_message(
        &self,
        thread_id: ThreadId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<()>;

    /// 给消息添加表情回应
    async fn set_reaction(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<()>;

    /// 把用户加入会话
    async fn add_member(&self, thread_id: ThreadId, user_id: UserId) -> Result<()>;

    /// 把用户移出会话
    async fn remove_member(&self, thread_id: ThreadId, user_id: UserId) -> Result<()>;
}
