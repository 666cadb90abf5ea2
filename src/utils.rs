use std::path::Path;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::bot::handler::HandlerKind;
use crate::error::HandlerLoadError;

/// 日志记录工具
pub struct Logger;

impl Logger {
    /// 按配置的过滤规则构造日志器，`Settings` 已经让 RUST_LOG 优先于 logLevel
    pub fn builder(filters: &str) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(filters);
        builder
    }

    pub fn log_operation_start(operation: &str, details: &str) {
        info!("🚀 Starting {}: {}", operation, details);
    }

    pub fn log_operation_success(operation: &str, details: &str) {
        info!("✅ {} completed successfully: {}", operation, details);
    }

    pub fn log_operation_failure(operation: &str, error: &str) {
        error!("❌ {} failed: {}", operation, error);
    }

    pub fn log_handler_loaded(kind: HandlerKind, name: &str, elapsed: Duration) {
        debug!("Loaded {} {} - ({}ms)", kind, name, elapsed.as_millis());
    }

    pub fn log_handler_skipped(kind: HandlerKind, error: &HandlerLoadError) {
        if error.is_missing_dependency() {
            error!("📦 Skipping {} handler, operator action required: {}", kind, error);
        } else {
            warn!("⚠️ Skipping {} handler: {}", kind, error);
        }
    }

    pub fn log_handler_replaced(kind: HandlerKind, name: &str, path: &Path) {
        warn!(
            "🔁 {} {} redefined by {}, keeping the later file",
            kind,
            name,
            path.display()
        );
    }
}

/// 格式化工具
pub struct Formatter;

impl Formatter {
    /// 格式化运行时长，例如 `1d 2h 3m 4s`
    pub fn format_uptime(uptime: chrono::Duration) -> String {
        let total = uptime.num_seconds().max(0);
        let days = total / 86_400;
        let hours = (total % 86_400) / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;

        let mut parts = Vec::new();
        if days > 0 {
            parts.push(format!("{days}d"));
        }
        if days > 0 || hours > 0 {
            parts.push(format!("{hours}h"));
        }
        if days > 0 || hours > 0 || minutes > 0 {
            parts.push(format!("{minutes}m"));
        }
        parts.push(format!("{seconds}s"));

        parts.join(" ")
    }

    /// 日志里截断过长的消息内容
    pub fn preview(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }

        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

/// 验证工具
pub struct Validator;

impl Validator {
    /// 处理器名称来自文件名，含空白的名字永远无法被命令匹配
    pub fn is_valid_handler_name(name: &str) -> bool {
        !name.is_empty() && !name.chars().any(char::is_whitespace)
    }
}
