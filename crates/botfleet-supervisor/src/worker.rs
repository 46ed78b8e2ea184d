//! One polling worker per running bot.
//!
//! Wraps a teloxide `Dispatcher` driving long polling for a single token.
//! Polling errors flow through [`PollErrorHandler`], which implements the
//! conflict policy: a 409 (another process polls the same token) stops the
//! worker for good, everything else is logged and polling continues.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use teloxide::error_handlers::ErrorHandler;
use teloxide::prelude::*;
use teloxide::ApiError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_telegram::pipeline;
use botfleet_telegram::{TelegramAppContext, WorkerBotId};

use crate::supervisor::Supervisor;

/// Handle to a live polling worker, kept in the supervisor's active set.
pub struct WorkerHandle {
    pub bot: Bot,
    pub shutdown: teloxide::dispatching::ShutdownToken,
    pub join: JoinHandle<()>,
}

/// Build and spawn the dispatcher for one bot. The returned handle is the
/// only way to reach the worker afterwards.
pub async fn spawn_worker<C: TelegramAppContext + 'static>(
    supervisor: &Arc<Supervisor>,
    ctx: &Arc<C>,
    bot_id: &str,
    bot: Bot,
) -> WorkerHandle {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(pipeline::handle_message::<C>))
        .branch(Update::filter_callback_query().endpoint(pipeline::handle_callback::<C>));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![
            Arc::clone(ctx),
            WorkerBotId(bot_id.to_string())
        ])
        .default_handler(|_upd| async {})
        .build();

    let shutdown = dispatcher.shutdown_token();

    let error_handler = Arc::new(PollErrorHandler {
        supervisor: Arc::clone(supervisor),
        ctx: Arc::clone(ctx),
        bot_id: bot_id.to_string(),
    });

    let listener = teloxide::update_listeners::polling_default(bot.clone()).await;
    let id = bot_id.to_string();
    let join = tokio::spawn(async move {
        info!(bot_id = %id, "polling worker started");
        dispatcher.dispatch_with_listener(listener, error_handler).await;
        info!(bot_id = %id, "polling worker stopped");
    });

    WorkerHandle {
        bot,
        shutdown,
        join,
    }
}

/// Listener error policy for one worker.
struct PollErrorHandler<C: TelegramAppContext + 'static> {
    supervisor: Arc<Supervisor>,
    ctx: Arc<C>,
    bot_id: String,
}

impl<C: TelegramAppContext + 'static> ErrorHandler<teloxide::RequestError>
    for PollErrorHandler<C>
{
    fn handle_error(self: Arc<Self>, err: teloxide::RequestError) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            match err {
                teloxide::RequestError::Api(ApiError::TerminatedByOtherGetUpdates) => {
                    warn!(bot_id = %self.bot_id, "polling conflict (409): another process holds this token");
                    self.ctx.logs().append(
                        LogLevel::Warning,
                        LogCategory::Telegram,
                        format!(
                            "Polling conflict for bot {}: token is used by another process, stopping",
                            self.bot_id
                        ),
                        None,
                    );
                    // Stop must run outside the dispatcher's own loop, or the
                    // shutdown future would wait on itself.
                    let supervisor = Arc::clone(&self.supervisor);
                    let ctx = Arc::clone(&self.ctx);
                    let bot_id = self.bot_id.clone();
                    tokio::spawn(async move {
                        supervisor.stop(&ctx, &bot_id).await;
                    });
                }
                e => {
                    // Transient Telegram/network failures: log, keep polling.
                    error!(bot_id = %self.bot_id, error = %e, "polling error");
                    self.ctx.logs().append(
                        LogLevel::Error,
                        LogCategory::Telegram,
                        format!("Polling error for bot {}: {e}", self.bot_id),
                        None,
                    );
                }
            }
        })
    }
}
