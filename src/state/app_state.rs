//! Main application state management

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::ValidationError,
    services::{resolve_config, CountdownEngine, SnapshotResolver, TimerEntityService, ValueResolver},
};
use super::{CardConfig, CountdownState, EntityState, HostSnapshot, TimerCache, TimerData};

/// Validation failure as shown to the display layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewError {
    pub code: &'static str,
    pub message: String,
}

impl From<&ValidationError> for ViewError {
    fn from(error: &ValidationError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Everything one tick publishes, derived from a single host snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountdownView {
    pub state: CountdownState,
    pub progress: f64,
    pub subtitle: String,
    pub expired: bool,
    pub timer: Option<TimerData>,
    pub color: Option<&'static str>,
    pub error: Option<ViewError>,
    pub updated_at: DateTime<Utc>,
}

impl CountdownView {
    /// View before the first tick has committed
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            state: CountdownState::zero(),
            progress: 0.0,
            subtitle: String::new(),
            expired: false,
            timer: None,
            color: None,
            error: None,
            updated_at: now,
        }
    }

    fn invalid(error: &ValidationError, now: DateTime<Utc>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(now)
        }
    }
}

/// Inputs captured when a tick starts
#[derive(Debug, Clone)]
pub struct TickTicket {
    pub generation: u64,
    pub snapshot: Arc<HostSnapshot>,
    pub config: CardConfig,
}

/// Main application state shared by the HTTP handlers and background tasks
#[derive(Debug)]
pub struct AppState {
    /// Countdown engine, locked for the whole commit of a tick
    pub engine: Arc<Mutex<CountdownEngine>>,
    pub card_config: Arc<Mutex<CardConfig>>,
    /// Latest host snapshot; ticks hold their own `Arc` to it
    pub snapshot: Arc<Mutex<Arc<HostSnapshot>>>,
    pub cache: Arc<TimerCache>,
    pub resolver: Arc<dyn ValueResolver>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    generation: AtomicU64,
    attached: AtomicBool,
    pub current_view: Arc<Mutex<CountdownView>>,
    /// Channel for view updates
    pub view_tx: watch::Sender<CountdownView>,
    /// Keep the receiver alive to prevent channel closure
    pub _view_rx: watch::Receiver<CountdownView>,
}

impl AppState {
    /// Create a new AppState for one card. Ticking starts attached.
    pub fn new(port: u16, host: String, card_config: CardConfig, google_retention: chrono::Duration) -> Self {
        let cache = Arc::new(TimerCache::new());
        let timers = TimerEntityService::new(Arc::clone(&cache)).with_google_retention(google_retention);
        let initial = CountdownView::empty(Utc::now());
        let (view_tx, view_rx) = watch::channel(initial.clone());

        Self {
            engine: Arc::new(Mutex::new(CountdownEngine::new(timers))),
            card_config: Arc::new(Mutex::new(card_config)),
            snapshot: Arc::new(Mutex::new(Arc::new(HostSnapshot::new()))),
            cache,
            resolver: Arc::new(SnapshotResolver),
            start_time: Instant::now(),
            port,
            host,
            generation: AtomicU64::new(0),
            attached: AtomicBool::new(true),
            current_view: Arc::new(Mutex::new(initial)),
            view_tx,
            _view_rx: view_rx,
        }
    }

    /// Swap in a different value resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn ValueResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Start a tick: capture the snapshot and config it will be computed from.
    /// Returns `None` while detached.
    pub fn begin_tick(&self) -> Result<Option<TickTicket>, String> {
        if !self.is_attached() {
            return Ok(None);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.get_snapshot()?;
        let config = self.get_card_config()?;

        Ok(Some(TickTicket {
            generation,
            snapshot,
            config,
        }))
    }

    /// Resolve the ticket's config fields. May be overtaken by later ticks.
    pub async fn resolve_tick(&self, ticket: &TickTicket) -> CardConfig {
        resolve_config(self.resolver.as_ref(), &ticket.config, &ticket.snapshot).await
    }

    /// Compute and publish the view for a resolved tick.
    ///
    /// Returns `None` when the tick was overtaken by a newer one or the
    /// instance was detached while it was resolving.
    pub fn commit_tick(
        &self,
        ticket: &TickTicket,
        resolved: &CardConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<CountdownView>, String> {
        let mut engine = self.engine.lock()
            .map_err(|e| format!("Failed to lock countdown engine: {}", e))?;

        if !self.is_current(ticket) {
            debug!("Discarding result of tick {}", ticket.generation);
            return Ok(None);
        }

        let view = match ticket.config.validate() {
            Err(e) => {
                engine.reset();
                CountdownView::invalid(&e, now)
            }
            Ok(()) => {
                let host = ticket.snapshot.as_ref();
                let state = engine.update_countdown(resolved, host, now);
                let progress = engine.calculate_progress(resolved, host, now);
                let subtitle = engine.get_subtitle(resolved, host, now, None, false);
                let timer = engine.current_timer().cloned();
                let color = timer.as_ref().map(TimerEntityService::get_timer_state_color);

                CountdownView {
                    state,
                    progress,
                    subtitle,
                    expired: engine.is_expired(),
                    timer,
                    color,
                    error: None,
                    updated_at: now,
                }
            }
        };

        // Publish before releasing the engine so views stay in tick order
        if let Ok(mut current) = self.current_view.lock() {
            *current = view.clone();
        }
        if let Err(e) = self.view_tx.send(view.clone()) {
            warn!("Failed to send view update: {}", e);
        }
        drop(engine);

        Ok(Some(view))
    }

    /// One full tick against the current snapshot
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<Option<CountdownView>, String> {
        let Some(ticket) = self.begin_tick()? else {
            return Ok(None);
        };
        let resolved = self.resolve_tick(&ticket).await;
        self.commit_tick(&ticket, &resolved, now)
    }

    fn is_current(&self, ticket: &TickTicket) -> bool {
        self.is_attached() && self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Enable ticking
    pub fn attach(&self) {
        if !self.attached.swap(true, Ordering::SeqCst) {
            info!("Countdown attached");
        }
    }

    /// Disable ticking and drop any tick still resolving
    pub fn detach(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!("Countdown detached");
        }
    }

    /// Replace the whole host snapshot
    pub fn set_snapshot(&self, snapshot: HostSnapshot) -> Result<(), String> {
        let mut current = self.snapshot.lock()
            .map_err(|e| format!("Failed to lock host snapshot: {}", e))?;
        debug!("Host snapshot replaced with {} entities", snapshot.len());
        *current = Arc::new(snapshot);
        Ok(())
    }

    /// Insert or replace one entity. Ticks in flight keep their own copy.
    pub fn upsert_entity(&self, entity_id: &str, entity: EntityState) -> Result<(), String> {
        let mut current = self.snapshot.lock()
            .map_err(|e| format!("Failed to lock host snapshot: {}", e))?;
        Arc::make_mut(&mut current).insert(entity_id, entity);
        Ok(())
    }

    pub fn get_snapshot(&self) -> Result<Arc<HostSnapshot>, String> {
        self.snapshot.lock()
            .map(|snapshot| Arc::clone(&snapshot))
            .map_err(|e| format!("Failed to lock host snapshot: {}", e))
    }

    /// Replace the card configuration and start the engine over
    pub fn set_card_config(&self, config: CardConfig) -> Result<(), String> {
        let mut engine = self.engine.lock()
            .map_err(|e| format!("Failed to lock countdown engine: {}", e))?;
        let mut current = self.card_config.lock()
            .map_err(|e| format!("Failed to lock card config: {}", e))?;

        info!("Card configuration replaced");
        *current = config;
        *engine = CountdownEngine::new(engine.timers().clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn get_card_config(&self) -> Result<CardConfig, String> {
        self.card_config.lock()
            .map(|config| config.clone())
            .map_err(|e| format!("Failed to lock card config: {}", e))
    }

    /// Latest published view
    pub fn get_view(&self) -> Result<CountdownView, String> {
        self.current_view.lock()
            .map(|view| view.clone())
            .map_err(|e| format!("Failed to lock countdown view: {}", e))
    }

    pub fn timers(&self) -> Result<TimerEntityService, String> {
        self.engine.lock()
            .map(|engine| engine.timers().clone())
            .map_err(|e| format!("Failed to lock countdown engine: {}", e))
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn app(config: CardConfig) -> AppState {
        AppState::new(0, "127.0.0.1".into(), config, chrono::Duration::seconds(30))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_tick_publishes_view() {
        let state = app(CardConfig::for_target("2024-03-02T13:00:00Z"));
        let mut rx = state.view_tx.subscribe();

        let view = state.run_tick(now()).await.unwrap().unwrap();
        assert_eq!((view.state.days, view.state.hours), (1, 1));
        assert_eq!(view.subtitle, "1 day and 1 hour");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().subtitle, "1 day and 1 hour");
        assert_eq!(state.get_view().unwrap(), view);
    }

    #[tokio::test]
    async fn test_overtaken_tick_is_discarded() {
        let state = app(CardConfig::for_target("2024-03-02T13:00:00Z"));

        let stale = state.begin_tick().unwrap().unwrap();
        let fresh = state.begin_tick().unwrap().unwrap();
        let resolved = state.resolve_tick(&stale).await;
        assert_eq!(state.commit_tick(&stale, &resolved, now()).unwrap(), None);

        let resolved = state.resolve_tick(&fresh).await;
        assert!(state.commit_tick(&fresh, &resolved, now()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_detach_drops_in_flight_tick() {
        let state = app(CardConfig::for_target("2024-03-02T13:00:00Z"));

        let ticket = state.begin_tick().unwrap().unwrap();
        state.detach();
        let resolved = state.resolve_tick(&ticket).await;
        assert_eq!(state.commit_tick(&ticket, &resolved, now()).unwrap(), None);
        assert!(state.begin_tick().unwrap().is_none());

        state.attach();
        assert!(state.run_tick(now()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_source_is_reported_not_thrown() {
        let state = app(CardConfig::default());
        let view = state.run_tick(now()).await.unwrap().unwrap();
        let error = view.error.unwrap();
        assert_eq!(error.code, "missing_source");
        assert!(view.state.is_zero());
    }

    #[tokio::test]
    async fn test_upsert_does_not_touch_captured_snapshot() {
        let state = app(CardConfig::for_timer("timer.tea"));
        let ticket = state.begin_tick().unwrap().unwrap();

        state.upsert_entity("timer.tea", EntityState::new("active")).unwrap();
        assert!(ticket.snapshot.get("timer.tea").is_none());
        assert!(state.get_snapshot().unwrap().get("timer.tea").is_some());
    }
}
