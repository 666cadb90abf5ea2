use std::path::PathBuf;

use teloxide::RequestError;
use thiserror::Error;

/// 程序退出码：监督进程看到它会重新拉起机器人
pub const RELOAD_EXIT_CODE: i32 = 2;

#[derive(Error, Debug)]
pub enum YueBotError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] RequestError),

    #[error("Handler load error: {0}")]
    HandlerLoad(#[from] HandlerLoadError),

    #[error("Handler {name} failed: {message}")]
    HandlerExecution { name: String, message: String },

    #[error("Session login failed: {message}")]
    SessionLogin { message: String },

    #[error("Session closed: inbound event stream ended")]
    SessionClosed,

    #[error("Invalid user id: {value}")]
    InvalidUserId { value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, YueBotError>;

/// 加载处理器模块时的错误，只会导致该文件被跳过
#[derive(Error, Debug)]
pub enum HandlerLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid handler name for {path}")]
    InvalidName { path: PathBuf },

    #[error("invalid handler {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("{path} depends on missing builtin `{dependency}`")]
    MissingDependency { path: PathBuf, dependency: String },
}

impl HandlerLoadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            HandlerLoadError::Io { path, .. }
            | HandlerLoadError::Parse { path, .. }
            | HandlerLoadError::InvalidName { path }
            | HandlerLoadError::Invalid { path, .. }
            | HandlerLoadError::MissingDependency { path, .. } => path,
        }
    }

    /// 缺失依赖需要运维处理，不会在运行时自动修复
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, HandlerLoadError::MissingDependency { .. })
    }
}

impl YueBotError {
    pub fn handler_execution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerExecution {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn session_login(message: impl Into<String>) -> Self {
        Self::SessionLogin {
            message: message.into(),
        }
    }

    pub fn invalid_user_id(value: impl Into<String>) -> Self {
        Self::InvalidUserId {
            value: value.into(),
        }
    }

    /// 网络抖动和限流可以重试，API 明确拒绝（例如 token 无效）不行
    pub fn is_retryable(&self) -> bool {
        match self {
            YueBotError::Telegram(e) => matches!(
                e,
                RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
            ),
            YueBotError::Io(_) => true,
            _ => false,
        }
    }

    /// Telegram 限流时要求等待的时间
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            YueBotError::Telegram(RequestError::RetryAfter(seconds)) => Some(seconds.duration()),
            _ => None,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            YueBotError::Config(_) => ErrorSeverity::Critical,
            YueBotError::Telegram(_) => ErrorSeverity::Medium,
            YueBotError::HandlerLoad(_) => ErrorSeverity::Low,
            YueBotError::HandlerExecution { .. } => ErrorSeverity::Low,
            YueBotError::SessionLogin { .. } => ErrorSeverity::Critical,
            YueBotError::SessionClosed => ErrorSeverity::High,
            YueBotError::InvalidUserId { .. } => ErrorSeverity::Low,
            YueBotError::Io(_) => ErrorSeverity::Medium,
            YueBotError::Json(_) => ErrorSeverity::High,
        }
    }

    /// 进程因该错误退出时使用的退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            YueBotError::SessionClosed => RELOAD_EXIT_CODE,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(YueBotError::SessionClosed.exit_code(), RELOAD_EXIT_CODE);
        assert_eq!(YueBotError::session_login("bad token").exit_code(), 1);
        assert_eq!(
            YueBotError::Config(anyhow::anyhow!("missing prefix")).exit_code(),
            1
        );
    }

    #[test]
    fn test_retryable_and_severity() {
        let io = YueBotError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timeout",
        ));
        assert!(io.is_retryable());
        assert!(!YueBotError::session_login("denied").is_retryable());
        assert!(!YueBotError::invalid_user_id("abc").is_retryable());

        assert_eq!(
            YueBotError::session_login("denied").severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(ErrorSeverity::Low.to_string(), "LOW");
    }

    #[test]
    fn test_telegram_retry_policy() {
        use teloxide::types::Seconds;
        use teloxide::ApiError;

        let limited = YueBotError::Telegram(RequestError::RetryAfter(Seconds::from_seconds(3)));
        assert!(limited.is_retryable());
        assert_eq!(
            limited.retry_after(),
            Some(std::time::Duration::from_secs(3))
        );

        let rejected = YueBotError::Telegram(RequestError::Api(ApiError::InvalidToken));
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.retry_after(), None);
    }

    #[test]
    fn test_load_error_path() {
        let err = HandlerLoadError::MissingDependency {
            path: PathBuf::from("commands/weather.toml"),
            dependency: "weather".to_string(),
        };
        assert!(err.is_missing_dependency());
        assert_eq!(err.path(), &PathBuf::from("commands/weather.toml"));
        assert!(err.to_string().contains("missing builtin `weather`"));
    }
}
