//! Periodic repair of `is_running` drift.
//!
//! A crash or a missed error path can leave a row claiming a worker that no
//! longer exists. Every 60 s the reconciler flips such rows back to stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_telegram::TelegramAppContext;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Run until `shutdown` broadcasts `true`.
pub async fn run_reconciler<C: TelegramAppContext>(
    ctx: Arc<C>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("reconciler started");
    let mut interval = tokio::time::interval(RECONCILE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick(ctx.as_ref());
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("reconciler shutting down");
                    break;
                }
            }
        }
    }
}

fn tick<C: TelegramAppContext>(ctx: &C) {
    let marked = match ctx.store().bots_marked_running() {
        Ok(ids) => ids,
        Err(e) => {
            error!("reconciler query failed: {e}");
            return;
        }
    };

    for bot_id in marked {
        if ctx.worker_active(&bot_id) {
            continue;
        }
        if let Err(e) = ctx.store().set_running(&bot_id, false) {
            error!(bot_id, error = %e, "reconciler failed to clear is_running");
            continue;
        }
        ctx.logs().append(
            LogLevel::Warning,
            LogCategory::Bot,
            format!("Reconciler: bot {bot_id} was marked running without a worker, flag cleared"),
            None,
        );
    }
}
