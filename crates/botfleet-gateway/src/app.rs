use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use dashmap::DashMap;

use botfleet_core::config::FleetConfig;
use botfleet_core::logbuf::LogBuffer;
use botfleet_core::stats::RequestStats;
use botfleet_llm::LlmClient;
use botfleet_store::Store;
use botfleet_supervisor::Supervisor;
use botfleet_telegram::{ContextRegistry, TelegramAppContext};

/// Central shared state — passed as Arc<AppState> to all Axum handlers and
/// into every bot worker.
pub struct AppState {
    pub config: FleetConfig,
    pub store: Store,
    pub llm: LlmClient,
    pub registry: ContextRegistry,
    pub logs: LogBuffer,
    pub stats: Arc<RequestStats>,
    pub supervisor: Arc<Supervisor>,
    /// Active admin sessions: session id -> email.
    pub sessions: DashMap<String, String>,
}

impl AppState {
    pub fn new(config: FleetConfig, store: Store) -> Self {
        let stats = Arc::new(RequestStats::new());
        Self {
            config,
            store,
            llm: LlmClient::new(stats.clone()),
            registry: ContextRegistry::new(),
            logs: LogBuffer::new(),
            stats,
            supervisor: Arc::new(Supervisor::new()),
            sessions: DashMap::new(),
        }
    }
}

impl TelegramAppContext for AppState {
    fn store(&self) -> &Store {
        &self.store
    }

    fn llm(&self) -> &LlmClient {
        &self.llm
    }

    fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    fn stats(&self) -> &RequestStats {
        &self.stats
    }

    fn worker_active(&self, bot_id: &str) -> bool {
        self.supervisor.is_active(bot_id)
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/login", post(crate::auth::login))
        .route("/api/auth/logout", post(crate::auth::logout))
        .route("/api/auth/check", get(crate::auth::check))
        .route(
            "/api/bots",
            get(crate::http::bots::list).post(crate::http::bots::create),
        )
        .route(
            "/api/bots/{id}",
            put(crate::http::bots::update).delete(crate::http::bots::remove),
        )
        .route("/api/bots/{id}/toggle", post(crate::http::bots::toggle))
        .route(
            "/api/bots/{id}/refresh-info",
            post(crate::http::bots::refresh_info),
        )
        .route(
            "/api/databases",
            get(crate::http::databases::list).post(crate::http::databases::create),
        )
        .route(
            "/api/databases/{id}",
            get(crate::http::databases::get_one)
                .put(crate::http::databases::update)
                .delete(crate::http::databases::remove),
        )
        .route(
            "/api/bots/{bot_id}/commands",
            get(crate::http::commands::list).post(crate::http::commands::create),
        )
        .route(
            "/api/bots/{bot_id}/commands/{cmd_id}",
            get(crate::http::commands::get_one)
                .put(crate::http::commands::update)
                .delete(crate::http::commands::remove),
        )
        .route(
            "/api/bots/{bot_id}/multi-command-context/{cmd_id}",
            delete(crate::http::commands::clear_context),
        )
        .route(
            "/api/bots/{bot_id}/chat-history",
            get(crate::http::history::list).delete(crate::http::history::clear),
        )
        .route(
            "/api/bots/{bot_id}/chat-history/{msg_id}",
            delete(crate::http::history::remove),
        )
        .route("/api/dashboard/stats", get(crate::http::dashboard::stats))
        .route(
            "/api/dashboard/charts/messages",
            get(crate::http::dashboard::messages_chart),
        )
        .route(
            "/api/dashboard/charts/ai-requests",
            get(crate::http::dashboard::ai_requests_chart),
        )
        .route(
            "/api/dashboard/charts/system",
            get(crate::http::dashboard::system_chart),
        )
        .route("/api/debug/logs", get(crate::http::debug::logs))
        .route("/api/debug/stats", get(crate::http::debug::stats))
        .route(
            "/api/settings",
            get(crate::http::settings::list).put(crate::http::settings::update),
        )
        .route("/api/support/chat", post(crate::http::support::chat))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::http::track_requests,
        ))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
