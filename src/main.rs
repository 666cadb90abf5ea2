use std::sync::Arc;

use chrono::Utc;
use dotenv::dotenv;
use log::{debug, info, warn};

use yuebot::bot::{Builtins, DispatchEngine, HandlerRegistry, SessionState, TelegramGateway};
use yuebot::config::Settings;
use yuebot::error::{Result, YueBotError};
use yuebot::retry::RetryConfig;
use yuebot::runtime::RuntimeContext;
use yuebot::utils::Logger;

#[tokio::main]
async fn main() {
    // 加载环境变量
    dotenv().ok();

    // 先读配置，日志级别来自 logLevel 或 RUST_LOG
    let settings = Settings::new();
    let log_level = settings
        .as_ref()
        .map(|s| s.log_level.clone())
        .unwrap_or_else(|_| Settings::default().log_level);
    Logger::builder(&log_level).init();

    let result = match settings {
        Ok(settings) => run(settings).await,
        Err(e) => Err(YueBotError::from(e)),
    };

    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            Logger::log_operation_failure("YueBot", &format!("[{}] {e}", e.severity()));
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(settings: Settings) -> Result<()> {
    let started_at = Utc::now();
    Logger::log_operation_start("YueBot", "Initializing application");

    settings.validate()?;
    if settings.command_prefix != settings.command_prefix.to_lowercase() {
        warn!(
            "Command prefix {:?} contains uppercase letters and will never match",
            settings.command_prefix
        );
    }
    Logger::log_operation_success("Configuration", "Settings loaded successfully");

    // 加载命令和事件处理器
    let builtins = Builtins::new(started_at);
    let (registry, report) =
        HandlerRegistry::load(&settings.commands_path, &settings.events_path, &builtins)?;
    if !report.skipped.is_empty() {
        warn!("{} handler modules were skipped, see log above", report.skipped.len());
    }

    // 登录
    let state = SessionState::load(&settings.state_path)?;
    let retry = RetryConfig::with_max_attempts(settings.max_retry_attempts);
    let (session, events) = TelegramGateway::login(&state, retry).await?;

    info!("🤖 {} initialized successfully!", settings.bot_name);
    info!("📊 Configuration:");
    info!("  - Prefix: {}", settings.command_prefix);
    info!("  - Commands: {}", registry.command_names().join(", "));
    info!("  - Event handlers: {}", registry.event_names().join(", "));
    info!("  - Builtins: {}", Builtins::NAMES.join(", "));
    for name in registry.command_names() {
        if let Some(entry) = registry.command(name) {
            debug!("    {}{} {}", settings.command_prefix, name, entry.handler.description());
        }
    }

    let runtime = RuntimeContext::new(settings, registry, started_at);
    let engine = DispatchEngine::new(runtime, Arc::new(session));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("👋 Shutting down");
            Ok(())
        }
        processed = engine.run(events) => {
            warn!("Inbound event stream closed after {processed} events, requesting reload");
            Err(YueBotError::SessionClosed)
        }
    }
}
