//! Shared-state trait injected into every Telegram handler.

use botfleet_core::logbuf::LogBuffer;
use botfleet_core::stats::RequestStats;
use botfleet_llm::LlmClient;
use botfleet_store::Store;

use crate::registry::ContextRegistry;

/// Capabilities the message pipeline needs from the hosting application.
/// The gateway's `AppState` implements this; handlers stay decoupled from it.
pub trait TelegramAppContext: Send + Sync {
    fn store(&self) -> &Store;
    fn llm(&self) -> &LlmClient;
    fn registry(&self) -> &ContextRegistry;
    fn logs(&self) -> &LogBuffer;
    fn stats(&self) -> &RequestStats;

    /// True when the supervisor currently holds a polling worker for this
    /// bot. In-flight handlers of a stopping worker see `false` and drop
    /// their messages.
    fn worker_active(&self, bot_id: &str) -> bool;
}

/// The bot id a worker was started for, injected as a dptree dependency so
/// handlers know which tenant they serve.
#[derive(Debug, Clone)]
pub struct WorkerBotId(pub String);
