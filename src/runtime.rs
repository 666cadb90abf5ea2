use chrono::{DateTime, Utc};

use crate::bot::registry::HandlerRegistry;
use crate::config::Settings;

/// 启动时构建一次的运行时上下文，替代进程级的全局状态
#[derive(Debug)]
pub struct RuntimeContext {
    pub settings: Settings,
    pub registry: HandlerRegistry,
    pub started_at: DateTime<Utc>,
}

impl RuntimeContext {
    pub fn new(settings: Settings, registry: HandlerRegistry, started_at: DateTime<Utc>) -> Self {
        Self {
            settings,
            registry,
            started_at,
        }
    }

    pub fn command_prefix(&self) -> &str {
        &self.settings.command_prefix
    }
}
