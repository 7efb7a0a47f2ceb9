mod auth;

pub mod archived;
pub mod body;
pub mod config;
pub mod error;
pub mod executor;
pub mod plan;
pub mod push;

pub use body::{ExternalUrlError, ExternalUrlSource};
pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use executor::PlanExecutor;
pub use plan::{Operations, Plan};
