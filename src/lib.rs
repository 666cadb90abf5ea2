// 公开内部模块以便测试
pub mod bot;
pub mod config;
pub mod error;
pub mod retry;
pub mod runtime;
pub mod supervisor;
pub mod utils;

// 重新导出常用的类型和结构体
pub use bot::{ChatSession, DispatchEngine, DispatchOutcome, HandlerRegistry, InboundEvent};
pub use config::Settings;
pub use error::YueBotError;
pub use runtime::RuntimeContext;
