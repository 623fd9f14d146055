use std::sync::Arc;

use chrono::{Duration, Local};
use tracing::{error, info, warn};

use crate::{
    stats::{daily_totals, totals_by_category, weekly_totals, CategoryTotal},
    storage::{
        categories::CategoryRegistry, entities::SessionEntity, session_store::SessionStore,
    },
    timer::{FinishedSession, Timer},
    utils::clock::Clock,
};

use super::{
    config::AppConfig,
    surface::{MenuAction, MenuModel, MenuSurface},
};

/// Top level orchestrator. Relays menu actions into the timer, the registry
/// and the store, and pushes the resulting display state out through the
/// surface. It owns all mutable state and processes one action at a time to
/// completion, so nothing here needs synchronization.
pub struct MenuController<S, M> {
    timer: Timer,
    registry: CategoryRegistry,
    store: Arc<S>,
    /// Everything ever recorded, kept in memory so stats never have to go
    /// back to the disk. Appended in lockstep with successful writes.
    sessions: Vec<SessionEntity>,
    pending: Option<FinishedSession>,
    surface: M,
    clock: Box<dyn Clock>,
    config: AppConfig,
    threshold_notified: bool,
}

impl<S: SessionStore + Send + Sync, M: MenuSurface> MenuController<S, M> {
    pub fn new(
        timer: Timer,
        registry: CategoryRegistry,
        store: Arc<S>,
        sessions: Vec<SessionEntity>,
        surface: M,
        clock: Box<dyn Clock>,
        config: AppConfig,
    ) -> Self {
        Self {
            timer,
            registry,
            store,
            sessions,
            pending: None,
            surface,
            clock,
            config,
            threshold_notified: false,
        }
    }

    /// Processes one relayed user action to completion and refreshes the
    /// menu afterwards.
    pub async fn handle(&mut self, action: MenuAction) {
        match action {
            MenuAction::StartTimer => self.start_timer(),
            MenuAction::StopTimer => self.stop_timer(),
            MenuAction::AssignCategory(name) => self.assign(&name).await,
            MenuAction::DiscardPending => self.discard(),
        }
        self.render();
    }

    /// Periodic heartbeat, roughly once a second while the process lives.
    /// Drives the live elapsed display and the two time based policies.
    pub async fn tick(&mut self) {
        if self.timer.over_limit() {
            info!("Session exceeded the configured cap, stopping it");
            self.stop_timer();
            self.notify(
                "Session cap reached",
                "The running session was stopped, pick a category for it.",
            );
        } else if !self.threshold_notified {
            if let (Some(threshold), Some(elapsed)) =
                (self.config.notify_after(), self.timer.elapsed())
            {
                if elapsed >= threshold {
                    self.threshold_notified = true;
                    self.notify(
                        "Still at it",
                        &format!("{} of deep work so far.", format_duration(elapsed)),
                    );
                }
            }
        }
        self.render();
    }

    fn start_timer(&mut self) {
        if self.pending.is_some() {
            self.notify(
                "Finish up first",
                "Assign or discard the finished session before starting a new one.",
            );
            return;
        }
        match self.timer.start() {
            Ok(()) => {
                self.threshold_notified = false;
                info!("Session started");
            }
            // Only reachable when the menu got out of sync with the timer,
            // treated as a no-op.
            Err(e) => warn!("Ignoring start request: {e}"),
        }
    }

    fn stop_timer(&mut self) {
        match self.timer.stop() {
            Ok(finished) => {
                info!(
                    "Session stopped after {}",
                    format_duration(finished.duration)
                );
                self.pending = Some(finished);
            }
            Err(e) => warn!("Ignoring stop request: {e}"),
        }
    }

    async fn assign(&mut self, name: &str) {
        let Some(finished) = self.pending.clone() else {
            warn!("No pending session to assign");
            return;
        };

        // Sessions may only reference known categories, unseen names are
        // registered on first use.
        if !self.registry.contains(name) {
            if let Err(e) = self.registry.create(name).await {
                error!("Couldn't create category {name}: {e}");
                self.notify("Couldn't create category", &e.to_string());
                return;
            }
        }

        let session = SessionEntity {
            category: name.into(),
            start: finished.started_at,
            duration: finished.duration,
        };
        match self.store.append(session.clone()).await {
            Ok(()) => {
                self.sessions.push(session);
                self.pending = None;
                self.notify(
                    "Session saved",
                    &format!("{} in {name}.", format_duration(finished.duration)),
                );
            }
            Err(e) => {
                // The session stays pending, assigning again retries the
                // write with nothing lost.
                error!("Couldn't persist session: {e}");
                self.notify(
                    "Couldn't save session",
                    "It is still pending, try assigning it again.",
                );
            }
        }
    }

    fn discard(&mut self) {
        if self.pending.take().is_some() {
            info!("Pending session discarded");
        } else {
            warn!("No pending session to discard");
        }
    }

    fn notify(&mut self, summary: &str, body: &str) {
        if let Err(e) = self.surface.notify(summary, body) {
            error!("Notification failed: {e:?}");
        }
    }

    pub fn render(&mut self) {
        let model = self.model();
        if let Err(e) = self.surface.render(&model) {
            error!("Menu render failed: {e:?}");
        }
    }

    fn model(&self) -> MenuModel {
        let now = self.clock.time().with_timezone(&Local);
        let elapsed = self.timer.elapsed();
        MenuModel {
            title: format_clock(elapsed.unwrap_or_else(Duration::zero)),
            status: match (&elapsed, &self.pending) {
                (Some(elapsed), _) => format!("Deep work for {}", format_duration(*elapsed)),
                (None, Some(finished)) => format!(
                    "Unassigned session: {}",
                    format_duration(finished.duration)
                ),
                (None, None) => "Idle".to_string(),
            },
            running: self.timer.is_running(),
            pending: self
                .pending
                .as_ref()
                .map(|f| format!("Assign {} to:", format_duration(f.duration))),
            categories: self
                .registry
                .list()
                .iter()
                .map(|c| c.name.as_ref().to_string())
                .collect(),
            today: stat_lines(daily_totals(&self.sessions, now)),
            this_week: stat_lines(weekly_totals(&self.sessions, now)),
            all_time: stat_lines(totals_by_category(&self.sessions)),
        }
    }
}

fn stat_lines(totals: Vec<CategoryTotal>) -> Vec<String> {
    totals
        .iter()
        .map(|t| format!("{}\t{}", format_duration(t.duration), t.category))
        .collect()
}

/// "0:25:03" style, what the bar itself shows.
fn format_clock(v: Duration) -> String {
    let seconds = v.num_seconds().max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    use super::{format_clock, format_duration, MenuController};
    use crate::{
        app::{
            config::AppConfig,
            surface::{MenuAction, MockMenuSurface},
        },
        storage::{
            categories::CategoryRegistry,
            session_store::{SessionStore, SessionStoreImpl},
        },
        timer::Timer,
        utils::clock::testing::ManualClock,
    };

    fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 0).unwrap()
    }

    async fn controller(
        dir: &TempDir,
        clock: ManualClock,
        surface: MockMenuSurface,
        config: AppConfig,
    ) -> MenuController<SessionStoreImpl, MockMenuSurface> {
        let store = Arc::new(SessionStoreImpl::new(dir.path().join("sessions")).unwrap());
        let registry =
            CategoryRegistry::load(dir.path().join("categories.json"), Box::new(clock.clone()))
                .await;
        let timer = Timer::new(Box::new(clock.clone()), config.max_session());
        MenuController::new(
            timer,
            registry,
            store,
            vec![],
            surface,
            Box::new(clock),
            config,
        )
    }

    fn quiet_surface() -> MockMenuSurface {
        let mut surface = MockMenuSurface::new();
        surface.expect_render().returning(|_| Ok(()));
        surface.expect_notify().returning(|_, _| Ok(()));
        surface
    }

    #[tokio::test]
    async fn start_stop_assign_persists_the_session() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());

        let mut surface = MockMenuSurface::new();
        surface.expect_render().returning(|_| Ok(()));
        surface
            .expect_notify()
            .withf(|summary, body| summary == "Session saved" && body.contains("Writing"))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut controller =
            controller(&dir, clock.clone(), surface, AppConfig::default()).await;

        controller.handle(MenuAction::StartTimer).await;
        clock.advance(Duration::minutes(25));
        controller.handle(MenuAction::StopTimer).await;
        controller
            .handle(MenuAction::AssignCategory("Writing".into()))
            .await;

        let store = SessionStoreImpl::new(dir.path().join("sessions"))?;
        let stored = store.day_sessions(nine_am().date_naive()).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].category.as_ref(), "Writing");
        assert_eq!(stored[0].start, nine_am());
        assert_eq!(stored[0].duration, Duration::minutes(25));

        Ok(())
    }

    #[tokio::test]
    async fn assigning_an_unknown_name_registers_it() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());
        let mut controller = controller(
            &dir,
            clock.clone(),
            quiet_surface(),
            AppConfig::default(),
        )
        .await;

        controller.handle(MenuAction::StartTimer).await;
        clock.advance(Duration::minutes(5));
        controller.handle(MenuAction::StopTimer).await;
        controller
            .handle(MenuAction::AssignCategory("Thesis".into()))
            .await;

        let registry = CategoryRegistry::load(
            dir.path().join("categories.json"),
            Box::new(clock.clone()),
        )
        .await;
        assert!(registry.contains("Thesis"));

        Ok(())
    }

    #[tokio::test]
    async fn stray_actions_are_no_ops() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());
        let mut controller = controller(
            &dir,
            clock.clone(),
            quiet_surface(),
            AppConfig::default(),
        )
        .await;

        // none of these have anything to act on
        controller.handle(MenuAction::StopTimer).await;
        controller
            .handle(MenuAction::AssignCategory("Writing".into()))
            .await;
        controller.handle(MenuAction::DiscardPending).await;

        let store = SessionStoreImpl::new(dir.path().join("sessions"))?;
        assert!(store.stored_days().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn starting_is_blocked_while_a_session_is_unassigned() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());
        let mut controller = controller(
            &dir,
            clock.clone(),
            quiet_surface(),
            AppConfig::default(),
        )
        .await;

        controller.handle(MenuAction::StartTimer).await;
        clock.advance(Duration::minutes(5));
        controller.handle(MenuAction::StopTimer).await;
        controller.handle(MenuAction::StartTimer).await;

        // the timer must not have restarted over the pending session
        assert!(!controller.timer.is_running());

        controller.handle(MenuAction::DiscardPending).await;
        controller.handle(MenuAction::StartTimer).await;
        assert!(controller.timer.is_running());

        Ok(())
    }

    #[tokio::test]
    async fn discarded_sessions_are_not_persisted() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());
        let mut controller = controller(
            &dir,
            clock.clone(),
            quiet_surface(),
            AppConfig::default(),
        )
        .await;

        controller.handle(MenuAction::StartTimer).await;
        clock.advance(Duration::minutes(5));
        controller.handle(MenuAction::StopTimer).await;
        controller.handle(MenuAction::DiscardPending).await;

        let store = SessionStoreImpl::new(dir.path().join("sessions"))?;
        assert!(store.stored_days().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn threshold_notification_fires_exactly_once() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());

        let mut surface = MockMenuSurface::new();
        surface.expect_render().returning(|_| Ok(()));
        surface
            .expect_notify()
            .withf(|summary, _| summary == "Still at it")
            .times(1)
            .returning(|_, _| Ok(()));

        let config = AppConfig {
            max_session_minutes: None,
            notify_after_minutes: Some(45),
        };
        let mut controller = controller(&dir, clock.clone(), surface, config).await;

        controller.handle(MenuAction::StartTimer).await;
        clock.advance(Duration::minutes(44));
        controller.tick().await;
        clock.advance(Duration::minutes(1));
        controller.tick().await;
        clock.advance(Duration::minutes(1));
        controller.tick().await;

        Ok(())
    }

    #[tokio::test]
    async fn session_cap_stops_the_timer_implicitly() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());

        let mut surface = MockMenuSurface::new();
        surface.expect_render().returning(|_| Ok(()));
        surface
            .expect_notify()
            .withf(|summary, _| summary == "Session cap reached")
            .times(1)
            .returning(|_, _| Ok(()));

        let config = AppConfig {
            max_session_minutes: Some(90),
            notify_after_minutes: None,
        };
        let mut controller = controller(&dir, clock.clone(), surface, config).await;

        controller.handle(MenuAction::StartTimer).await;
        clock.advance(Duration::minutes(91));
        controller.tick().await;

        assert!(!controller.timer.is_running());
        assert!(controller.pending.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn model_reflects_state_and_stats() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::at(nine_am());
        let mut controller = controller(
            &dir,
            clock.clone(),
            quiet_surface(),
            AppConfig::default(),
        )
        .await;

        let idle = controller.model();
        assert_eq!(idle.title, "0:00:00");
        assert_eq!(idle.status, "Idle");
        assert!(!idle.running);
        assert_eq!(idle.categories, ["Writing", "Coding", "Reading"]);

        controller.handle(MenuAction::StartTimer).await;
        clock.advance(Duration::minutes(25) + Duration::seconds(3));
        let running = controller.model();
        assert_eq!(running.title, "0:25:03");
        assert!(running.running);

        controller.handle(MenuAction::StopTimer).await;
        controller
            .handle(MenuAction::AssignCategory("Writing".into()))
            .await;
        let after = controller.model();
        assert_eq!(after.today, ["25m3s\tWriting"]);
        assert_eq!(after.all_time, ["25m3s\tWriting"]);

        Ok(())
    }

    #[test]
    fn clock_and_duration_formats() {
        assert_eq!(format_clock(Duration::zero()), "0:00:00");
        assert_eq!(
            format_clock(Duration::hours(1) + Duration::seconds(62)),
            "1:01:02"
        );
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(
            format_duration(Duration::minutes(25) + Duration::seconds(3)),
            "25m3s"
        );
        assert_eq!(
            format_duration(Duration::hours(2) + Duration::minutes(5)),
            "2h5m0s"
        );
    }
}
