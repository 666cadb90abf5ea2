use std::sync::Arc;

use log::debug;
use tokio::task::JoinHandle;

use crate::bot::event::{InboundEvent, MessageId, ThreadId, UserId};
use crate::bot::traits::ChatSession;
use crate::error::Result;

/// 绑定到触发事件的一组便捷操作，每次分发都会新建一个
pub struct ActionBox {
    session: Arc<dyn ChatSession>,
    thread_id: ThreadId,
    message_id: MessageId,
}

impl ActionBox {
    pub fn new(session: Arc<dyn ChatSession>, event: &InboundEvent) -> Self {
        Self {
            session,
            thread_id: event.thread_id,
            message_id: event.message_id,
        }
    }

    /// 回复触发事件的那条消息
    pub async fn reply(&self, text: &str) -> Result<()> {
        self.session
            .send_message(self.thread_id, text, Some(self.message_id))
            .await
    }

    /// 发送到同一会话，不关联原消息
    pub async fn send(&self, text: &str) -> Result<()> {
        self.session.send_message(self.thread_id, text, None).await
    }

    /// 表情回应，不等待结果，失败也只记录日志
    pub fn react(&self, emoji: &str) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let thread_id = self.thread_id;
        let message_id = self.message_id;
        let emoji = emoji.to_string();

        tokio::spawn(async move {
            if let Err(e) = session.set_reaction(thread_id, message_id, &emoji).await {
                debug!("Ignoring failed reaction {emoji} on {thread_id}/{message_id}: {e}");
            }
        })
    }

    pub async fn add(&self, user_id: UserId) -> Result<()> {
        self.session.add_member(self.thread_id, user_id).await
    }

    pub async fn kick(&self, user_id: UserId) -> Result<()> {
        self.session.remove_member(self.thread_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::traits::MockChatSession;
    use crate::error::YueBotError;
    use mockall::predicate::eq;

    fn event() -> InboundEvent {
        InboundEvent::message(ThreadId(100), MessageId(7), UserId(1), "!ping")
    }

    #[tokio::test]
    async fn test_reply_links_to_triggering_message() {
        let mut session = MockChatSession::new();
        session
            .expect_send_message()
            .withf(|thread, text, reply_to| {
                *thread == ThreadId(100) && text == "pong" && *reply_to == Some(MessageId(7))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let actions = ActionBox::new(Arc::new(session), &event());
        actions.reply("pong").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_has_no_reply_linkage() {
        let mut session = MockChatSession::new();
        session
            .expect_send_message()
            .withf(|thread, text, reply_to| {
                *thread == ThreadId(100) && text == "hello" && reply_to.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let actions = ActionBox::new(Arc::new(session), &event());
        actions.send("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_react_swallows_errors() {
        let mut session = MockChatSession::new();
        session
            .expect_set_reaction()
            .withf(|thread, message, emoji| {
                *thread == ThreadId(100) && *message == MessageId(7) && emoji == "👍"
            })
            .times(1)
            .returning(|_, _, _| Err(YueBotError::session_login("offline")));

        let actions = ActionBox::new(Arc::new(session), &event());
        // 任务本身不能 panic
        actions.react("👍").await.unwrap();
    }

    #[tokio::test]
    async fn test_add_and_kick_target_event_thread() {
        let mut session = MockChatSession::new();
        session
            .expect_add_member()
            .with(eq(ThreadId(100)), eq(UserId(55)))
            .times(1)
            .returning(|_, _| Ok(()));
        session
            .expect_remove_member()
            .with(eq(ThreadId(100)), eq(UserId(66)))
            .times(1)
            .returning(|_, _| Ok(()));

        let actions = ActionBox::new(Arc::new(session), &event());
        actions.add(UserId(55)).await.unwrap();
        actions.kick(UserId(66)).await.unwrap();
    }
}
