pub mod action_box;
pub mod builtins;
pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod registry;
pub mod script;
pub mod telegram;
pub mod traits;

pub use action_box::ActionBox;
pub use builtins::Builtins;
pub use dispatcher::{DispatchEngine, DispatchOutcome};
pub use event::{EventKind, InboundEvent, MessageId, ThreadId, UserId};
pub use handler::{Context, Handler, HandlerKind};
pub use registry::{HandlerEntry, HandlerRegistry, LoadReport};
pub use telegram::{SessionState, TelegramGateway, TelegramSession};
pub use traits::ChatSession;
