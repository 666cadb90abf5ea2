//! 处理器模块的磁盘格式
//!
//! 每个 `.toml` / `.json` 文件描述一个处理器：要么是一串动作步骤，
//! 要么引用一个编译进程序的内置处理器。

use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::bot::builtins::Builtins;
use crate::bot::event::{EventKind, UserId};
use crate::bot::handler::{Context, Handler};
use crate::error::HandlerLoadError;

/// 支持的模块扩展名
pub const SCRIPT_EXTENSIONS: &[&str] = &["json", "toml"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerScript {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min_args: usize,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub events: Vec<EventKind>,
    #[serde(default)]
    pub builtin: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", deny_unknown_fields)]
pub enum Step {
    Reply { text: String },
    Send { text: String },
    React { emoji: String },
    Add { user: String },
    Kick { user: String },
}

enum ScriptBody {
    Steps(Vec<Step>),
    Builtin(Arc<dyn Handler>),
}

pub struct ScriptHandler {
    description: String,
    min_args: usize,
    usage: Option<String>,
    events: Vec<EventKind>,
    body: ScriptBody,
}

impl HandlerScript {
    pub fn parse(path: &Path, raw: &str) -> Result<Self, HandlerLoadError> {
        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<HandlerScript>(raw).map_err(|e| e.to_string()),
            Some("json") => serde_json::from_str::<HandlerScript>(raw).map_err(|e| e.to_string()),
            other => Err(format!("unsupported extension {other:?}")),
        };

        parsed.map_err(|message| HandlerLoadError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// 校验并解析出可执行的处理器
    pub fn compile(self, path: &Path, builtins: &Builtins) -> Result<ScriptHandler, HandlerLoadError> {
        let body = match (self.builtin, self.steps.is_empty()) {
            (Some(_), false) => {
                return Err(HandlerLoadError::Invalid {
                    path: path.to_path_buf(),
                    message: "a handler cannot declare both `builtin` and `steps`".to_string(),
                })
            }
            (Some(name), true) => {
                let handler =
                    builtins
                        .resolve(&name)
                        .ok_or_else(|| HandlerLoadError::MissingDependency {
                            path: path.to_path_buf(),
                            dependency: name.clone(),
                        })?;
                ScriptBody::Builtin(handler)
            }
            (None, false) => ScriptBody::Steps(self.steps),
            (None, true) => {
                return Err(HandlerLoadError::Invalid {
                    path: path.to_path_buf(),
                    message: "no `steps` or `builtin` to run".to_string(),
                })
            }
        };

        Ok(ScriptHandler {
            description: self.description,
            min_args: self.min_args,
            usage: self.usage,
            events: self.events,
            body,
        })
    }
}

/// 读取并编译一个处理器模块
pub fn load_script(path: &Path, builtins: &Builtins) -> Result<ScriptHandler, HandlerLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| HandlerLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    HandlerScript::parse(path, &raw)?.compile(path, builtins)
}

pub fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

fn placeholder_regex() -> &'static Regex {
    static INSTANCE: OnceLock<Regex> = OnceLock::new();
    INSTANCE.get_or_init(|| Regex::new(r"\{([a-z]+|\d+)\}").unwrap())
}

/// 展开模板里的 `{args}`、`{0}`、`{sender}` 等占位符，未知占位符原样保留
pub fn render_template(template: &str, ctx: &Context<'_>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            if let Ok(index) = key.parse::<usize>() {
                return ctx.args.get(index).cloned().unwrap_or_default();
            }

            match key {
                "args" => ctx.args.join(" "),
                "sender" => ctx
                    .event
                    .sender_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                "thread" => ctx.event.thread_id.to_string(),
                "message" => ctx.event.message_id.to_string(),
                "body" => ctx.event.body().unwrap_or_default().to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

impl ScriptHandler {
    pub fn min_args(&self) -> usize {
        self.min_args
    }

    async fn run_steps(&self, steps: &[Step], ctx: &Context<'_>) -> Result<()> {
        for step in steps {
            debug!("Running step {step:?} in thread {}", ctx.event.thread_id);

            match step {
                Step::Reply { text } => ctx.action_box.reply(&render_template(text, ctx)).await?,
                Step::Send { text } => ctx.action_box.send(&render_template(text, ctx)).await?,
                Step::React { emoji } => {
                    ctx.action_box.react(&render_template(emoji, ctx));
                }
                Step::Add { user } => {
                    let user_id: UserId = render_template(user, ctx).parse()?;
                    ctx.action_box.add(user_id).await?;
                }
                Step::Kick { user } => {
                    let user_id: UserId = render_template(user, ctx).parse()?;
                    ctx.action_box.kick(user_id).await?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Handler for ScriptHandler {
    async fn run(&self, ctx: &Context<'_>) -> Result<()> {
        if ctx.args.len() < self.min_args {
            let usage = self
                .usage
                .as_deref()
                .unwrap_or("Missing arguments.");
            ctx.action_box.reply(&render_template(usage, ctx)).await?;
            return Ok(());
        }

        match &self.body {
            ScriptBody::Steps(steps) => self.run_steps(steps, ctx).await,
            ScriptBody::Builtin(handler) => handler.run(ctx).await,
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn accepts(&self, kind: EventKind) -> bool {
        self.events.is_empty() || self.events.contains(&kind)
    }
}
