pub mod config;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;
pub mod value;

pub use config::AppConfig;
pub use error::{CollaboratorKind, ExecutionTrace, FlowError, Result};
pub use event::EventBus;
pub use types::*;
pub use value::{Object, Value};
