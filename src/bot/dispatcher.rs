use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::bot::action_box::ActionBox;
use crate::bot::event::InboundEvent;
use crate::bot::handler::Context;
use crate::bot::registry::HandlerEntry;
use crate::bot::traits::ChatSession;
use crate::error::{Result, YueBotError};
use crate::runtime::RuntimeContext;
use crate::utils::Formatter;

/// 内置命令：回复当前前缀，优先级高于注册表
pub const PREFIX_QUERY: &str = "prefix";
pub const UNKNOWN_COMMAND_REPLY: &str = "Command doesnt exist.";

/// 一条消息在命令通道上的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<'a> {
    Ignored,
    PrefixQuery,
    Command { name: &'a str, args: Vec<&'a str> },
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored,
    PrefixShown,
    CommandInvoked { name: String },
    CommandFailed { name: String, error: String },
    UnknownCommand { name: String },
    PassThrough,
}

/// 分类消息。前缀比较时忽略大小写，命令名保持用户输入的原样
pub fn classify<'a>(body: Option<&'a str>, prefix: &str) -> Classification<'a> {
    let Some(body) = body else {
        return Classification::Ignored;
    };

    if body.to_lowercase() == PREFIX_QUERY {
        return Classification::PrefixQuery;
    }

    match strip_prefix_ignore_case(body, prefix) {
        Some(rest) => {
            let mut parts = rest.trim().split(' ');
            let name = parts.next().unwrap_or_default();
            Classification::Command {
                name,
                args: parts.collect(),
            }
        }
        None => Classification::PassThrough,
    }
}

/// 小写后的消息以前缀开头时，返回原始消息去掉前缀后的部分
fn strip_prefix_ignore_case<'a>(body: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(body);
    }

    let mut lowered = String::with_capacity(prefix.len());
    for (idx, ch) in body.char_indices() {
        lowered.extend(ch.to_lowercase());

        // 一个字符小写后可能变成多个字符（如 `İ`），超出前缀长度时只要求以前缀开头
        if lowered.len() >= prefix.len() {
            return lowered
                .starts_with(prefix)
                .then(|| &body[idx + ch.len_utf8()..]);
        }
        if !prefix.starts_with(lowered.as_str()) {
            return None;
        }
    }

    None
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

pub struct DispatchEngine {
    runtime: RuntimeContext,
    session: Arc<dyn ChatSession>,
}

impl DispatchEngine {
    pub fn new(runtime: RuntimeContext, session: Arc<dyn ChatSession>) -> Self {
        Self { runtime, session }
    }

    /// 按顺序处理事件直到通道关闭，返回处理过的事件数
    pub async fn run(&self, mut events: mpsc::Receiver<InboundEvent>) -> usize {
        info!("🎯 Dispatch loop started");

        let mut processed = 0;
        while let Some(event) = events.recv().await {
            let outcome = self.handle_event(&event).await;
            debug!(
                "Event {} in thread {} -> {:?}",
                event.message_id, event.thread_id, outcome
            );
            processed += 1;
        }

        info!("Dispatch loop stopped after {processed} events");
        processed
    }

    /// 处理单个事件：先走命令通道，再通知所有事件处理器
    pub async fn handle_event(&self, event: &InboundEvent) -> DispatchOutcome {
        debug!(
            "Handling {} from {:?} in thread {}: {}",
            event.kind,
            event.sender_id,
            event.thread_id,
            event
                .body()
                .map(|b| Formatter::preview(b, 80))
                .unwrap_or_default()
        );

        let action_box = ActionBox::new(Arc::clone(&self.session), event);
        let outcome = self.dispatch_command(event, &action_box).await;
        let observers = self.notify_event_handlers(event, &action_box).await;
        if observers > 0 {
            debug!("{observers} event handlers observed message {}", event.message_id);
        }

        outcome
    }

    async fn dispatch_command(&self, event: &InboundEvent, action_box: &ActionBox) -> DispatchOutcome {
        let prefix = self.runtime.command_prefix();

        match classify(event.body(), prefix) {
            Classification::Ignored => DispatchOutcome::Ignored,
            Classification::PassThrough => DispatchOutcome::PassThrough,
            Classification::PrefixQuery => {
                let text = format!("My prefix is: `{prefix}`");
                if let Err(e) = action_box.reply(&text).await {
                    error!("Failed to send prefix reply: {e}");
                }
                DispatchOutcome::PrefixShown
            }
            Classification::Command { name, args } => {
                let Some(entry) = self.runtime.registry.command(name) else {
                    info!("Unknown command {name:?} in thread {}", event.thread_id);
                    if let Err(e) = action_box.reply(UNKNOWN_COMMAND_REPLY).await {
                        error!("Failed to send unknown command reply: {e}");
                    }
                    return DispatchOutcome::UnknownCommand {
                        name: name.to_string(),
                    };
                };

                let args: Vec<String> = args.into_iter().map(str::to_owned).collect();
                match self.invoke(entry, event, &args, action_box).await {
                    Ok(()) => {
                        debug!("Command {name} completed");
                        DispatchOutcome::CommandInvoked {
                            name: name.to_string(),
                        }
                    }
                    Err(e) => {
                        error!("Error occurred while executing command. {e}");
                        DispatchOutcome::CommandFailed {
                            name: name.to_string(),
                            error: e.to_string(),
                        }
                    }
                }
            }
        }
    }

    /// 事件处理器与命令通道并行，观察所有事件，返回实际运行的数量
    async fn notify_event_handlers(&self, event: &InboundEvent, action_box: &ActionBox) -> usize {
        let mut notified = 0;

        for entry in self
            .runtime
            .registry
            .event_handlers()
            .filter(|entry| entry.handler.accepts(event.kind))
        {
            notified += 1;
            if let Err(e) = self.invoke(entry, event, &[], action_box).await {
                error!("Error occurred while running event handler. {e}");
            }
        }

        notified
    }

    /// 处理器的错误和 panic 都在这里截住，不影响后续事件
    async fn invoke(
        &self,
        entry: &HandlerEntry,
        event: &InboundEvent,
        args: &[String],
        action_box: &ActionBox,
    ) -> Result<()> {
        let ctx = Context {
            session: self.session.as_ref(),
            event,
            args,
            action_box,
        };

        match AssertUnwindSafe(entry.handler.run(&ctx)).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(YueBotError::handler_execution(&entry.name, format!("{e:#}"))),
            Err(payload) => Err(YueBotError::handler_execution(
                &entry.name,
                panic_message(payload.as_ref()),
            )),
        }
    }
}
