//! Telegram 会话网关：登录、把更新转换成 `InboundEvent`，以及 `ChatSession` 的实现。

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::payloads::{SendMessageSetters, SetMessageReactionSetters, UnbanChatMemberSetters};
use teloxide::requests::Requester;
use teloxide::types::{
    ChatId, Message as TgMessage, MessageId as TgMessageId, ReactionType, ReplyParameters,
    Update, UserId as TgUserId,
};
use teloxide::{Bot, RequestError};
use tokio::sync::mpsc;

use crate::bot::event::{EventKind, InboundEvent, MessageId, ThreadId, UserId};
use crate::bot::traits::ChatSession;
use crate::error::{Result, YueBotError};
use crate::retry::{retry_with_backoff, RetryConfig};

/// 待分发事件队列的容量
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// 持久化的登录状态，分发核心不关心其内容
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub token: String,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("token", &"***")
            .finish()
    }
}

impl SessionState {
    /// 读取状态文件，TELEGRAM_BOT_TOKEN 优先
    pub fn load(path: &Path) -> Result<Self> {
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                return Ok(Self { token });
            }
        }

        if !path.exists() {
            return Err(YueBotError::session_login(format!(
                "no session state at {} and TELEGRAM_BOT_TOKEN is not set",
                path.display()
            )));
        }

        let state: SessionState = serde_json::from_str(&fs::read_to_string(path)?)?;
        if state.token.is_empty() {
            return Err(YueBotError::session_login("session state has an empty token"));
        }

        Ok(state)
    }
}

impl From<&TgMessage> for InboundEvent {
    fn from(msg: &TgMessage) -> Self {
        // 图片、文件等媒体消息的说明文字也可以触发命令
        let body = msg.text().or(msg.caption());

        let kind = if msg.new_chat_members().is_some() {
            EventKind::MemberJoined
        } else if msg.left_chat_member().is_some() {
            EventKind::MemberLeft
        } else if msg.reply_to_message().is_some() {
            EventKind::MessageReply
        } else if body.is_some() {
            EventKind::Message
        } else {
            EventKind::Other
        };

        InboundEvent {
            body: body.map(str::to_owned),
            thread_id: ThreadId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
            sender_id: msg.from.as_ref().map(|u| UserId(u.id.0)),
            kind,
        }
    }
}

#[derive(Clone)]
pub struct TelegramSession {
    bot: Bot,
}

impl TelegramSession {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatSession for TelegramSession {
    async fn send_message(
        &self,
        thread_id: ThreadId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(thread_id.0), text);
        if let Some(message_id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(TgMessageId(message_id.0)));
        }

        request.await?;
        Ok(())
    }

    async fn set_reaction(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<()> {
        self.bot
            .set_message_reaction(ChatId(thread_id.0), TgMessageId(message_id.0))
            .reaction(vec![ReactionType::Emoji {
                emoji: emoji.to_string(),
            }])
            .await?;
        Ok(())
    }

    /// Bot 不能直接拉人进群，这里解除封禁让用户可以重新加入
    async fn add_member(&self, thread_id: ThreadId, user_id: UserId) -> Result<()> {
        self.bot
            .unban_chat_member(ChatId(thread_id.0), TgUserId(user_id.0))
            .only_if_banned(true)
            .await?;
        Ok(())
    }

    /// 踢出 = 封禁后立即解封，用户之后仍可重新加入
    async fn remove_member(&self, thread_id: ThreadId, user_id: UserId) -> Result<()> {
        let chat_id = ChatId(thread_id.0);
        let user_id = TgUserId(user_id.0);

        self.bot.ban_chat_member(chat_id, user_id).await?;
        self.bot.unban_chat_member(chat_id, user_id).await?;
        Ok(())
    }
}

pub struct TelegramGateway;

impl TelegramGateway {
    /// 登录并开始监听更新，返回会话能力和事件接收端
    pub async fn login(
        state: &SessionState,
        retry: RetryConfig,
    ) -> Result<(TelegramSession, mpsc::Receiver<InboundEvent>)> {
        info!("🚀 Initializing Telegram Bot...");

        let bot = Bot::new(&state.token);
        let probe = bot.clone();

        let me = retry_with_backoff(
            move || {
                let bot = probe.clone();
                async move { bot.get_me().await.map_err(YueBotError::from) }
            },
            retry,
            "Telegram login",
        )
        .await
        .map_err(|e| {
            error!("❌ Failed to connect to Telegram Bot API: {e}");
            YueBotError::session_login(e.to_string())
        })?;

        info!("✅ Bot connected successfully:");
        info!("  - Username: @{}", me.username());
        info!("  - Name: {}", me.first_name);
        info!("  - ID: {}", me.id);

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let handler = Update::filter_message().endpoint(move |msg: TgMessage| {
            let tx = tx.clone();
            async move {
                if tx.send(InboundEvent::from(&msg)).await.is_err() {
                    warn!("Dispatch loop is gone, dropping message {}", msg.id.0);
                }
                Ok::<(), RequestError>(())
            }
        });

        let mut dispatcher = Dispatcher::builder(bot.clone(), handler).build();
        tokio::spawn(async move {
            dispatcher.dispatch().await;
            warn!("Telegram update listener stopped");
        });

        Ok((TelegramSession::new(bot), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn message_json(extra: serde_json::Value) -> TgMessage {
        let mut msg = serde_json::json!({
            "message_id": 100,
            "date": 1640000000,
            "chat": {
                "id": -1001234567890_i64,
                "type": "supergroup",
                "title": "Test Group"
            },
            "from": {
                "id": 42,
                "is_bot": false,
                "first_name": "Yue"
            }
        });
        if let (Some(target), Some(fields)) = (msg.as_object_mut(), extra.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(msg).unwrap()
    }

    #[test]
    fn test_text_message_to_event() {
        let msg = message_json(serde_json::json!({ "text": "!ping now" }));
        let event = InboundEvent::from(&msg);

        assert_eq!(event.body.as_deref(), Some("!ping now"));
        assert_eq!(event.thread_id, ThreadId(-1001234567890));
        assert_eq!(event.message_id, MessageId(100));
        assert_eq!(event.sender_id, Some(UserId(42)));
        assert_eq!(event.kind, EventKind::Message);
    }

    #[test]
    fn test_photo_caption_is_body() {
        let msg = message_json(serde_json::json!({
            "photo": [{
                "file_id": "AgADBAADbqcxG",
                "file_unique_id": "AQADbqcxG",
                "file_size": 1024,
                "width": 90,
                "height": 90
            }],
            "caption": "!ping"
        }));
        let event = InboundEvent::from(&msg);

        assert_eq!(event.body.as_deref(), Some("!ping"));
        assert_eq!(event.kind, EventKind::Message);
    }

    #[test]
    fn test_member_joined_has_no_body() {
        let msg = message_json(serde_json::json!({
            "new_chat_members": [{ "id": 7, "is_bot": false, "first_name": "New" }]
        }));
        let event = InboundEvent::from(&msg);

        assert_eq!(event.body, None);
        assert_eq!(event.kind, EventKind::MemberJoined);
    }

    #[test]
    #[serial]
    fn test_session_state_from_file() {
        env::remove_var("TELEGRAM_BOT_TOKEN");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appstate.json");
        fs::write(&path, r#"{ "token": "123:abc" }"#).unwrap();

        let state = SessionState::load(&path).unwrap();
        assert_eq!(state.token, "123:abc");
        assert!(!format!("{state:?}").contains("abc"));
    }

    #[test]
    #[serial]
    fn test_session_state_env_override_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appstate.json");

        env::remove_var("TELEGRAM_BOT_TOKEN");
        assert!(matches!(
            SessionState::load(&path),
            Err(YueBotError::SessionLogin { .. })
        ));

        env::set_var("TELEGRAM_BOT_TOKEN", "999:env");
        assert_eq!(SessionState::load(&path).unwrap().token, "999:env");
        env::remove_var("TELEGRAM_BOT_TOKEN");
    }
}
