use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::bot::handler::{Context, Handler};
use crate::utils::Formatter;

/// 处理器脚本可以通过 `builtin = "..."` 引用的内置处理器
pub struct Builtins {
    started_at: DateTime<Utc>,
}

impl Builtins {
    pub const NAMES: &'static [&'static str] = &["echo", "id", "uptime"];

    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>> {
        match name {
            "echo" => Some(Arc::new(EchoHandler)),
            "id" => Some(Arc::new(IdHandler)),
            "uptime" => Some(Arc::new(UptimeHandler {
                started_at: self.started_at,
            })),
            _ => None,
        }
    }
}

struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn run(&self, ctx: &Context<'_>) -> Result<()> {
        if ctx.args.iter().all(|a| a.is_empty()) {
            ctx.action_box.reply("Nothing to echo.").await?;
        } else {
            ctx.action_box.reply(&ctx.args.join(" ")).await?;
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Repeats the arguments"
    }
}

struct IdHandler;

#[async_trait]
impl Handler for IdHandler {
    async fn run(&self, ctx: &Context<'_>) -> Result<()> {
        let sender = ctx
            .event
            .sender_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let text = format!("User: {}\nThread: {}", sender, ctx.event.thread_id);
        ctx.action_box.reply(&text).await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Shows the sender and thread ids"
    }
}

struct UptimeHandler {
    started_at: DateTime<Utc>,
}

#[async_trait]
impl Handler for UptimeHandler {
    async fn run(&self, ctx: &Context<'_>) -> Result<()> {
        let uptime = Utc::now() - self.started_at;
        let text = format!("Uptime: {}", Formatter::format_uptime(uptime));
        ctx.action_box.reply(&text).await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Shows how long the bot has been running"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::action_box::ActionBox;
    use crate::bot::event::{InboundEvent, MessageId, ThreadId, UserId};
    use crate::bot::traits::MockChatSession;

    async fn run_builtin(name: &str, args: &[String], expected: &'static str) {
        let mut session = MockChatSession::new();
        session
            .expect_send_message()
            .withf(move |_, text, _| text.starts_with(expected))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let session = Arc::new(session);

        let handler = Builtins::new(Utc::now() - chrono::Duration::seconds(65))
            .resolve(name)
            .unwrap();
        let event = InboundEvent::message(ThreadId(5), MessageId(1), UserId(9), "!x");
        let action_box = ActionBox::new(session.clone(), &event);
        let ctx = Context {
            session: session.as_ref(),
            event: &event,
            args,
            action_box: &action_box,
        };

        handler.run(&ctx).await.unwrap();
    }

    #[test]
    fn test_resolve_known_names() {
        let builtins = Builtins::new(Utc::now());
        for name in Builtins::NAMES {
            assert!(builtins.resolve(name).is_some(), "{name} should resolve");
        }
        assert!(builtins.resolve("weather").is_none());
    }

    #[tokio::test]
    async fn test_echo() {
        run_builtin("echo", &["a".to_string(), "b".to_string()], "a b").await;
        run_builtin("echo", &[], "Nothing to echo.").await;
    }

    #[tokio::test]
    async fn test_id() {
        run_builtin("id", &[], "User: 9\nThread: 5").await;
    }

    #[tokio::test]
    async fn test_uptime() {
        run_builtin("uptime", &[], "Uptime: 1m 5s").await;
    }
}
