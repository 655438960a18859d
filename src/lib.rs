pub mod admission;
pub mod channel;
pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod event;
pub mod identity;
pub mod llm;
pub mod policy;
pub mod runtime;
pub mod thread;
pub mod transcript;

pub use matrixgpt_app::logging;
pub use matrixgpt_core::error;
pub use matrixgpt_core::llm_types;
pub use matrixgpt_core::text;
