use std::{path::PathBuf, pin::pin, sync::Arc, time::Duration};

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    storage::{
        categories::CategoryRegistry,
        entities::SessionEntity,
        session_store::{all_sessions, SessionStore, SessionStoreImpl},
    },
    timer::Timer,
    utils::clock::Clock,
};

use self::{
    config::AppConfig,
    controller::MenuController,
    surface::{MenuAction, MenuSurface},
};

pub mod config;
pub mod controller;
pub mod surface;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the starting point for the menu bar core. Loads everything
/// from the data directory, then processes actions and ticks until the
/// shutdown token is cancelled or every action sender is dropped.
pub async fn start_app(
    dir: PathBuf,
    surface: impl MenuSurface,
    actions: mpsc::UnboundedReceiver<MenuAction>,
    shutdown: CancellationToken,
    clock: impl Clock + Clone,
) -> Result<()> {
    let config = AppConfig::load_or_init(&dir.join("config.json")).await;
    let store = Arc::new(SessionStoreImpl::new(dir.join("sessions"))?);
    let registry =
        CategoryRegistry::load(dir.join("categories.json"), Box::new(clock.clone())).await;

    let sessions = load_history(store.clone()).await;
    info!("Loaded {} recorded sessions", sessions.len());

    let timer = Timer::new(Box::new(clock.clone()), config.max_session());
    let controller = MenuController::new(
        timer,
        registry,
        store,
        sessions,
        surface,
        Box::new(clock.clone()),
        config,
    );

    run_event_loop(controller, actions, shutdown, clock).await
}

/// Read errors degrade to whatever could be loaded. Starting with partial
/// history beats refusing to launch.
async fn load_history(store: Arc<SessionStoreImpl>) -> Vec<SessionEntity> {
    let mut stream = pin!(all_sessions(store));
    let mut sessions = vec![];
    while let Some(item) = stream.next().await {
        match item {
            Ok(session) => sessions.push(session),
            Err(e) => warn!("Skipping unreadable session data: {e}"),
        }
    }
    sessions.sort_by_key(|s| s.start);
    sessions
}

/// The single threaded event loop: user actions and the once a second tick,
/// each processed to completion before the next one is looked at.
async fn run_event_loop<S: SessionStore + Send + Sync, M: MenuSurface>(
    mut controller: MenuController<S, M>,
    mut actions: mpsc::UnboundedReceiver<MenuAction>,
    shutdown: CancellationToken,
    clock: impl Clock,
) -> Result<()> {
    controller.render();

    let mut tick_point = clock.instant() + TICK_INTERVAL;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                return Ok(());
            }
            action = actions.recv() => {
                match action {
                    Some(action) => controller.handle(action).await,
                    // All senders are gone, the shell went away.
                    None => return Ok(()),
                }
            }
            _ = clock.sleep_until(tick_point) => {
                tick_point += TICK_INTERVAL;
                controller.tick().await;
            }
        }
    }
}
