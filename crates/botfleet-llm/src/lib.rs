pub mod client;
pub mod error;
pub mod family;
pub mod prompt;
pub mod request;
pub mod response;
pub mod stream;
pub mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use family::ProviderFamily;
pub use stream::StreamEvent;
pub use types::{ChatMessage, Knowledge, KnowledgeKind, LlmTarget, Role};
