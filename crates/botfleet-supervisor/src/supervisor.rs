//! Lifecycle authority over the set of running bot workers.
//!
//! Start/Stop/Toggle are serialized per bot id; the active set is the single
//! source of truth the message pipeline consults before handling anything.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use teloxide::prelude::*;
use tracing::{info, warn};

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_store::types::{BotPatch, BotRow};
use botfleet_telegram::TelegramAppContext;

use crate::error::Result;
use crate::worker::{spawn_worker, WorkerHandle};

/// Settle time before opening a poll for a freshly (re)started bot.
const PRE_START_DELAY: Duration = Duration::from_secs(1);
/// Quiesce time after a worker is torn down.
const POST_STOP_DELAY: Duration = Duration::from_millis(500);
/// Attempts to stop a reluctant dispatcher, 1 s apart.
const STOP_ATTEMPTS: u32 = 3;

/// Identity discovered via getMe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotIdentity {
    pub username: Option<String>,
    pub first_name: String,
    pub telegram_bot_id: i64,
}

pub struct Supervisor {
    workers: DashMap<String, WorkerHandle>,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            workers: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// True when a polling worker currently exists for the bot.
    pub fn is_active(&self, bot_id: &str) -> bool {
        self.workers.contains_key(bot_id)
    }

    pub fn active_count(&self) -> usize {
        self.workers.len()
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.workers.iter().map(|e| e.key().clone()).collect()
    }

    fn lock_for(&self, bot_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(bot_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Start a bot's polling worker. No-op when already running.
    pub async fn start<C: TelegramAppContext + 'static>(
        self: Arc<Self>,
        ctx: &Arc<C>,
        bot_id: &str,
    ) -> Result<()> {
        let lock = self.lock_for(bot_id);
        let _guard = lock.lock().await;
        Self::start_locked(&self, ctx, bot_id).await
    }

    /// Stop a bot's polling worker. Never fails; residual errors are logged
    /// and the worker is force-removed.
    pub async fn stop<C: TelegramAppContext + 'static>(
        self: Arc<Self>,
        ctx: &Arc<C>,
        bot_id: &str,
    ) {
        let lock = self.lock_for(bot_id);
        let _guard = lock.lock().await;
        self.stop_locked(ctx, bot_id).await;
    }

    /// Start if stopped, stop if running. Returns the new running state.
    pub async fn toggle<C: TelegramAppContext + 'static>(
        self: Arc<Self>,
        ctx: &Arc<C>,
        bot_id: &str,
    ) -> Result<bool> {
        let lock = self.lock_for(bot_id);
        let _guard = lock.lock().await;
        if self.workers.contains_key(bot_id) {
            self.stop_locked(ctx, bot_id).await;
            ctx.store().set_active(bot_id, false)?;
            Ok(false)
        } else {
            ctx.store().set_active(bot_id, true)?;
            Self::start_locked(&self, ctx, bot_id).await?;
            Ok(true)
        }
    }

    /// Persist a config change, restarting the worker only when the token
    /// changed. Anything else hot-reloads because the pipeline re-reads the
    /// row on every message.
    pub async fn update_config<C: TelegramAppContext + 'static>(
        self: Arc<Self>,
        ctx: &Arc<C>,
        bot_id: &str,
        patch: &BotPatch,
    ) -> Result<BotRow> {
        let lock = self.lock_for(bot_id);
        let _guard = lock.lock().await;

        let current = ctx.store().get_bot(bot_id)?;
        let token_changed = patch
            .token
            .as_ref()
            .map(|t| *t != current.token)
            .unwrap_or(false);

        ctx.store().update_bot(bot_id, patch)?;

        if self.workers.contains_key(bot_id) && token_changed {
            info!(bot_id, "token changed while running, restarting worker");
            self.stop_locked(ctx, bot_id).await;
            Self::start_locked(&self, ctx, bot_id).await?;
        }

        ctx.store().get_bot(bot_id).map_err(Into::into)
    }

    /// One-shot getMe, persisted.
    pub async fn refresh_info<C: TelegramAppContext>(
        &self,
        ctx: &Arc<C>,
        bot_id: &str,
    ) -> Result<BotIdentity> {
        let row = ctx.store().get_bot(bot_id)?;
        let bot = Bot::new(&row.token);
        let me = bot.get_me().await?;
        let identity = BotIdentity {
            username: me.user.username.clone(),
            first_name: me.user.first_name.clone(),
            telegram_bot_id: me.user.id.0 as i64,
        };
        ctx.store().set_telegram_identity(
            bot_id,
            identity.username.as_deref(),
            &identity.first_name,
            identity.telegram_bot_id,
        )?;
        Ok(identity)
    }

    /// Stop (if running) and delete the row; commands and history cascade.
    pub async fn delete<C: TelegramAppContext + 'static>(
        self: Arc<Self>,
        ctx: &Arc<C>,
        bot_id: &str,
    ) -> Result<()> {
        let lock = self.lock_for(bot_id);
        let _guard = lock.lock().await;
        if self.workers.contains_key(bot_id) {
            self.stop_locked(ctx, bot_id).await;
        }
        ctx.store().delete_bot(bot_id)?;
        drop(_guard);
        self.locks.remove(bot_id);
        ctx.logs().append(
            LogLevel::Info,
            LogCategory::Bot,
            format!("Bot {bot_id} deleted"),
            None,
        );
        Ok(())
    }

    /// Start every bot the operator marked active. Used on process start so
    /// a restart restores intent.
    pub async fn resume_active<C: TelegramAppContext + 'static>(
        self: Arc<Self>,
        ctx: &Arc<C>,
    ) -> Result<()> {
        for row in ctx.store().active_bots()? {
            if let Err(e) = self.clone().start(ctx, &row.id).await {
                warn!(bot_id = %row.id, error = %e, "failed to resume bot");
                ctx.logs().append(
                    LogLevel::Error,
                    LogCategory::Bot,
                    format!("Failed to resume bot '{}': {e}", row.name),
                    None,
                );
            }
        }
        Ok(())
    }

    /// Graceful shutdown: stop all workers in parallel, then drop every chat
    /// context.
    pub async fn shutdown_all<C: TelegramAppContext + 'static>(self: Arc<Self>, ctx: &Arc<C>) {
        let ids = self.active_ids();
        let stops = ids.iter().map(|id| self.clone().stop(ctx, id));
        futures_util::future::join_all(stops).await;
        ctx.registry().clear_all();
        info!("all bot workers stopped");
    }

    // --- locked internals ---------------------------------------------------

    async fn start_locked<C: TelegramAppContext + 'static>(
        this: &Arc<Self>,
        ctx: &Arc<C>,
        bot_id: &str,
    ) -> Result<()> {
        if this.workers.contains_key(bot_id) {
            return Ok(());
        }

        let row = ctx.store().get_bot(bot_id)?;
        tokio::time::sleep(PRE_START_DELAY).await;

        let bot = Bot::new(&row.token);

        // Discover identity in the background; a slow Telegram must not
        // block the start path.
        {
            let ctx = Arc::clone(ctx);
            let bot = bot.clone();
            let id = bot_id.to_string();
            let name = row.name.clone();
            tokio::spawn(async move {
                match bot.get_me().await {
                    Ok(me) => {
                        if let Err(e) = ctx.store().set_telegram_identity(
                            &id,
                            me.user.username.as_deref(),
                            &me.user.first_name,
                            me.user.id.0 as i64,
                        ) {
                            warn!(bot_id = %id, error = %e, "failed to persist bot identity");
                        }
                    }
                    Err(e) => {
                        warn!(bot_id = %id, error = %e, "getMe failed");
                        ctx.logs().append(
                            LogLevel::Warning,
                            LogCategory::Telegram,
                            format!("getMe failed for bot '{name}': {e}"),
                            None,
                        );
                    }
                }
            });
        }

        let handle = spawn_worker(this, ctx, bot_id, bot).await;
        this.workers.insert(bot_id.to_string(), handle);
        ctx.store().set_running(bot_id, true)?;

        ctx.logs().append(
            LogLevel::Success,
            LogCategory::Bot,
            format!("Bot '{}' started", row.name),
            None,
        );
        Ok(())
    }

    async fn stop_locked<C: TelegramAppContext + 'static>(&self, ctx: &Arc<C>, bot_id: &str) {
        // Remove from the active set first: in-flight handlers see the bot
        // as inactive and drop their messages.
        let handle = match self.workers.remove(bot_id) {
            Some((_, handle)) => handle,
            None => {
                // Nothing running; still make sure the flag is honest.
                if let Err(e) = ctx.store().set_running(bot_id, false) {
                    warn!(bot_id, error = %e, "failed to clear is_running");
                }
                return;
            }
        };

        // Idempotent on a bot that never had a webhook.
        if let Err(e) = handle.bot.delete_webhook().await {
            tracing::debug!(bot_id, error = %e, "deleteWebhook failed (ignored)");
        }

        for attempt in 1..=STOP_ATTEMPTS {
            if handle.join.is_finished() {
                break;
            }
            match handle.shutdown.shutdown() {
                Ok(done) => {
                    done.await;
                    break;
                }
                Err(_) if attempt < STOP_ATTEMPTS => {
                    // Dispatcher not dispatching yet; give it a moment.
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(_) => {
                    warn!(bot_id, "dispatcher refused to stop, aborting worker task");
                    handle.join.abort();
                }
            }
        }

        ctx.registry().clear_by_bot(bot_id);
        tokio::time::sleep(POST_STOP_DELAY).await;

        if let Err(e) = ctx.store().set_running(bot_id, false) {
            warn!(bot_id, error = %e, "failed to persist stopped state");
        }
        ctx.logs().append(
            LogLevel::Info,
            LogCategory::Bot,
            format!("Bot {bot_id} stopped"),
            None,
        );
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
