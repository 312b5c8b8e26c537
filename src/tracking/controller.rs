// src/tracking/controller.rs
//! Run lifecycle controller: owns the tracker state and multiplexes its event sources

use super::{
    accumulator::{Accumulator, DEFAULT_WEIGHT_KG},
    auto_pause::{AutoPause, Transition},
    simulation::{simulated_heart_rate, Simulation},
    splits::SplitAggregator,
    state::{LiveStatus, RunSummary, Split, TrackPoint, TrackerState, TrackerStatus},
};
use crate::{
    background::{BackgroundBridge, BackgroundTask, LOCATION_TASK_NAME},
    config::{TrackerConfig, DEFAULT_SIMULATION_ORIGIN},
    error::ProviderError,
    gps::provider::{PositionProvider, PositionWatch, ProviderResult},
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{interval_at, timeout, Instant, Interval},
};
use uuid::Uuid;

/// Elapsed-time timer period
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Background buffer drain period
pub const DRAIN_INTERVAL: Duration = Duration::from_secs(2);
/// Upper bound for one auto-pause fix request; shorter than a poll period
pub const FIX_REQUEST_TIMEOUT: Duration = Duration::from_millis(1500);

/// Tunables taken from the configuration at construction
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub assumed_weight_kg: f64,
    pub enable_auto_pause: bool,
    pub simulation_origin: (f64, f64),
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            assumed_weight_kg: DEFAULT_WEIGHT_KG,
            enable_auto_pause: true,
            simulation_origin: DEFAULT_SIMULATION_ORIGIN,
        }
    }
}

impl From<&TrackerConfig> for TrackerSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            assumed_weight_kg: config.assumed_weight_kg,
            enable_auto_pause: config.enable_auto_pause,
            simulation_origin: config.simulation_origin,
        }
    }
}

/// One unit of work for the controller's event loop
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Tick,
    Position(TrackPoint),
    WatchClosed,
    Poll,
}

struct LiveWatch {
    handle: PositionWatch,
    updates: mpsc::UnboundedReceiver<TrackPoint>,
}

/// Orchestrates a run.
///
/// Every mutation goes through `&mut self`, so the controller is the single
/// writer of [`TrackerState`]. Consumers read snapshots via
/// [`RunController::snapshot`] or [`RunController::subscribe`].
pub struct RunController {
    settings: TrackerSettings,
    provider: Option<Arc<dyn PositionProvider>>,
    background: Arc<dyn BackgroundTask>,
    bridge: BackgroundBridge,
    task_registered: bool,
    background_active: bool,

    run_id: Option<String>,
    state: TrackerState,
    accumulator: Accumulator,
    auto_pause: AutoPause,
    splits: SplitAggregator,
    simulation: Option<Simulation>,

    timer: Option<Interval>,
    poll: Option<Interval>,
    watch: Option<LiveWatch>,
    fix_request: Option<JoinHandle<()>>,
    fix_tx: mpsc::UnboundedSender<TrackPoint>,
    fix_rx: mpsc::UnboundedReceiver<TrackPoint>,

    status_tx: watch::Sender<LiveStatus>,
}

impl RunController {
    pub fn new(
        settings: TrackerSettings,
        provider: Option<Arc<dyn PositionProvider>>,
        background: Arc<dyn BackgroundTask>,
        bridge: BackgroundBridge,
    ) -> Self {
        let state = TrackerState::new();
        let (status_tx, _) = watch::channel(LiveStatus::from(&state));
        let (fix_tx, fix_rx) = mpsc::unbounded_channel();

        Self {
            accumulator: Accumulator::new(settings.assumed_weight_kg),
            auto_pause: AutoPause::new(settings.enable_auto_pause),
            settings,
            provider,
            background,
            bridge,
            task_registered: false,
            background_active: false,
            run_id: None,
            state,
            splits: SplitAggregator::new(),
            simulation: None,
            timer: None,
            poll: None,
            watch: None,
            fix_request: None,
            fix_tx,
            fix_rx,
            status_tx,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Owned copy of the current state, path included
    pub fn snapshot(&self) -> TrackerState {
        self.state.clone()
    }

    /// Receiver that sees a fresh [`LiveStatus`] after every change
    pub fn subscribe(&self) -> watch::Receiver<LiveStatus> {
        self.status_tx.subscribe()
    }

    /// Defensive copy of the splits recorded so far
    pub fn splits(&self) -> Vec<Split> {
        self.splits.splits().to_vec()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn is_simulated(&self) -> bool {
        self.simulation.is_some()
    }

    pub fn has_live_watch(&self) -> bool {
        self.watch.is_some()
    }

    pub fn is_background_active(&self) -> bool {
        self.background_active
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone().unwrap_or_default(),
            status: self.state.status,
            elapsed_sec: self.state.elapsed_sec,
            distance_km: self.state.distance_km,
            pace_label: self.state.pace_label.clone(),
            calories: self.state.calories,
            points: self.state.path.len(),
            simulated: self.is_simulated(),
            splits: self.splits(),
        }
    }

    /// Begin a new run. No-op while one is already running.
    pub async fn start(&mut self) {
        if self.state.status == TrackerStatus::Running {
            return;
        }

        // A paused or finished run is replaced, never reused
        self.stop_sources();
        self.stop_background().await;

        let run_id = Uuid::new_v4().to_string();
        log::info!("Starting run {}", run_id);

        self.run_id = Some(run_id.clone());
        self.state = TrackerState::new();
        self.state.status = TrackerStatus::Running;
        self.auto_pause.reset();
        self.splits.reset();
        self.simulation = None;

        self.start_background(&run_id).await;
        self.start_timer();
        self.publish();

        let seed = match self.provider.clone() {
            Some(provider) => acquire_seed(provider.as_ref()).await,
            None => Err(ProviderError::Unavailable("no location provider installed".to_string())),
        };

        match seed {
            Ok(point) => {
                self.apply_point(point);
                if self.acquire_watch().await {
                    self.poll = Some(interval_at(Instant::now() + DRAIN_INTERVAL, DRAIN_INTERVAL));
                } else {
                    self.start_simulation();
                }
            }
            Err(e) => {
                log::warn!("{}; tracking with a simulated path", e);
                self.start_simulation();
            }
        }

        self.publish();
    }

    /// Manual pause. No-op unless running.
    pub fn pause(&mut self) {
        if self.state.status != TrackerStatus::Running {
            return;
        }

        self.state.status = TrackerStatus::Paused;
        self.state.is_auto_paused = false;
        self.auto_pause.set_manually_paused(true);
        self.timer = None;
        self.cancel_watch();
        self.cancel_fix_request();

        log::info!("Run paused at {:.3} km", self.state.distance_km);
        self.publish();
    }

    /// Resume after any pause. No-op unless paused.
    pub async fn resume(&mut self) {
        if self.state.status != TrackerStatus::Paused {
            return;
        }

        self.state.status = TrackerStatus::Running;
        self.state.is_auto_paused = false;
        self.auto_pause.set_manually_paused(false);
        self.auto_pause.clear_timers();
        self.start_timer();
        self.publish();

        log::info!("Run resumed");
        self.reacquire_source().await;
        self.publish();
    }

    /// End the run. Idempotent; no-op before a run has started.
    pub async fn finish(&mut self) {
        if matches!(self.state.status, TrackerStatus::Idle | TrackerStatus::Finished) {
            return;
        }

        self.state.status = TrackerStatus::Finished;
        self.state.is_auto_paused = false;
        self.stop_sources();
        self.accumulator.refresh(&mut self.state);
        self.publish();

        self.stop_background().await;
        log::info!(
            "Run {} finished: {:.3} km in {} s, {} splits",
            self.run_id.as_deref().unwrap_or("-"),
            self.state.distance_km,
            self.state.elapsed_sec,
            self.splits.splits().len()
        );
    }

    /// Wait for the next timer tick, live or requested fix, or drain poll.
    ///
    /// Returns `None` when no source is active (idle, finished, or paused
    /// without background tracking).
    pub async fn next_event(&mut self) -> Option<TrackerEvent> {
        if self.timer.is_none() && self.poll.is_none() && self.watch.is_none() {
            return None;
        }

        let updates = self.watch.as_mut().map(|watch| &mut watch.updates);

        tokio::select! {
            _ = next_tick(self.timer.as_mut()) => Some(TrackerEvent::Tick),
            point = next_point(updates) => Some(match point {
                Some(point) => TrackerEvent::Position(point),
                None => TrackerEvent::WatchClosed,
            }),
            Some(point) = self.fix_rx.recv() => Some(TrackerEvent::Position(point)),
            _ = next_tick(self.poll.as_mut()) => Some(TrackerEvent::Poll),
        }
    }

    pub async fn handle_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Tick => self.tick(),
            TrackerEvent::Position(point) => self.handle_point(point).await,
            TrackerEvent::WatchClosed => {
                log::warn!("Live position stream closed");
                self.cancel_watch();
            }
            TrackerEvent::Poll => self.poll_background().await,
        }
    }

    /// Process one event; false once there is nothing left to wait for
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// One second of running time
    pub fn tick(&mut self) {
        if self.state.status != TrackerStatus::Running {
            return;
        }

        self.state.elapsed_sec += 1;
        let bpm = simulated_heart_rate(self.state.elapsed_sec);
        self.state.heart_rate_bpm = bpm;
        self.splits.record_heart_rate(bpm);

        let simulated = self.simulation.as_mut().map(|sim| {
            let next_ms = sim.position().timestamp_ms + TICK_INTERVAL.as_millis() as i64;
            sim.advance(next_ms)
        });
        if let Some(point) = simulated {
            self.apply_point(point);
        }

        self.accumulator.refresh(&mut self.state);
        self.publish();
    }

    /// Apply a fix from any source, then restore the live watch if it
    /// triggered an auto-resume
    pub async fn handle_point(&mut self, point: TrackPoint) {
        if self.apply_point(point) == Some(Transition::Resume) {
            self.reacquire_source().await;
        }
        self.publish();
    }

    /// Drain buffered background fixes, and request a one-shot fix while auto-paused.
    ///
    /// The request runs on its own task; its fix comes back through
    /// [`RunController::next_event`] so a slow provider never holds the loop.
    pub async fn poll_background(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let Some(run_id) = self.run_id.clone() else {
            return;
        };

        if self.background_active {
            let points = self.bridge.drain(&run_id).await;
            if !points.is_empty() {
                log::debug!("Applying {} buffered background points", points.len());
            }
            for point in points {
                self.handle_point(point).await;
            }
        }

        if self.state.is_auto_paused {
            // The live watch is off while auto-paused; a one-shot fix feeds the resume check
            self.spawn_fix_request();
        } else if self.state.status == TrackerStatus::Running
            && self.simulation.is_none()
            && self.watch.is_none()
        {
            self.acquire_watch().await;
        }
    }

    /// Auto-pause evaluation, then accumulation and splits.
    ///
    /// Fixes seen while paused only feed the hysteresis unless they
    /// trigger a resume.
    fn apply_point(&mut self, point: TrackPoint) -> Option<Transition> {
        let before = self.state.status;
        if !matches!(before, TrackerStatus::Running | TrackerStatus::Paused) {
            return None;
        }

        let transition = self
            .auto_pause
            .evaluate(&point, before, self.state.is_auto_paused);

        match transition {
            Some(Transition::Pause) => self.enter_auto_pause(),
            Some(Transition::Resume) => self.enter_auto_resume(),
            None => {}
        }

        if before == TrackerStatus::Running || self.state.status == TrackerStatus::Running {
            self.accumulate(point);
        }

        transition
    }

    fn accumulate(&mut self, point: TrackPoint) {
        let previous = self.state.path.last().copied();
        let increment = self
            .accumulator
            .apply(&mut self.state, previous.as_ref(), &point);

        if let Some(km) = self.splits.on_distance(
            increment.previous_km,
            increment.distance_km,
            self.state.elapsed_sec,
        ) {
            self.state.last_milestone_km = km;
        }

        self.state.path.push(point);
    }

    fn enter_auto_pause(&mut self) {
        log::info!("Auto-paused at {:.3} km", self.state.distance_km);
        self.state.status = TrackerStatus::Paused;
        self.state.is_auto_paused = true;
        self.timer = None;
        self.cancel_watch();
    }

    fn enter_auto_resume(&mut self) {
        log::info!("Auto-resumed");
        self.state.status = TrackerStatus::Running;
        self.state.is_auto_paused = false;
        self.cancel_fix_request();
        self.start_timer();
    }

    /// Bring the position source back after a pause
    async fn reacquire_source(&mut self) {
        if self.simulation.is_some() || self.watch.is_some() {
            return;
        }
        if !self.acquire_watch().await {
            log::warn!("Live position unavailable on resume; continuing with a simulated path");
            self.start_simulation();
        }
    }

    async fn acquire_watch(&mut self) -> bool {
        let Some(provider) = self.provider.clone() else {
            return false;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        match provider.watch_position(tx).await {
            Ok(handle) => {
                log::debug!("Watching positions from {}", provider.name());
                self.watch = Some(LiveWatch {
                    handle,
                    updates: rx,
                });
                true
            }
            Err(e) => {
                log::warn!("Failed to watch positions from {}: {}", provider.name(), e);
                false
            }
        }
    }

    /// Continue from the last known point, or the configured origin
    fn start_simulation(&mut self) {
        let origin = match self.state.last_point() {
            Some(point) => *point,
            None => {
                let (lat, lon) = self.settings.simulation_origin;
                let point = TrackPoint::now(lat, lon);
                self.apply_point(point);
                point
            }
        };
        self.simulation = Some(Simulation::new(origin));
    }

    async fn start_background(&mut self, run_id: &str) {
        if !self.task_registered {
            self.background
                .register_task(LOCATION_TASK_NAME, self.bridge.clone())
                .await;
            self.task_registered = true;
        }

        let permission = match self.provider.clone() {
            Some(provider) => provider.request_background_permission().await,
            None => Err(ProviderError::Unavailable("no location provider installed".to_string())),
        };
        if let Err(e) = permission {
            log::warn!("Background location not granted ({}); foreground-only tracking", e);
            return;
        }

        match self.background.start_tracking(run_id).await {
            Ok(()) => self.background_active = true,
            Err(e) => log::warn!("{}; foreground-only tracking", e),
        }
    }

    async fn stop_background(&mut self) {
        if self.background_active || self.background.has_active_tracking().await {
            self.background.stop_tracking().await;
        }
        self.background_active = false;
    }

    fn start_timer(&mut self) {
        self.timer = Some(interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL));
    }

    fn cancel_watch(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.handle.cancel();
        }
    }

    /// At most one request in flight; a missing provider never requests
    fn spawn_fix_request(&mut self) {
        if self.fix_request.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let Some(provider) = self.provider.clone() else {
            return;
        };

        let results = self.fix_tx.clone();
        self.fix_request = Some(tokio::spawn(async move {
            match timeout(FIX_REQUEST_TIMEOUT, provider.current_position()).await {
                Ok(Ok(point)) => {
                    let _ = results.send(point);
                }
                Ok(Err(e)) => log::debug!("Auto-pause fix request failed: {}", e),
                Err(_) => log::debug!("Auto-pause fix request timed out after {:?}", FIX_REQUEST_TIMEOUT),
            }
        }));
    }

    /// Abort the request and discard any fix it already delivered
    fn cancel_fix_request(&mut self) {
        if let Some(task) = self.fix_request.take() {
            task.abort();
        }
        while self.fix_rx.try_recv().is_ok() {}
    }

    /// Drop every timer, the live watch and any pending fix request
    fn stop_sources(&mut self) {
        self.timer = None;
        self.poll = None;
        self.cancel_watch();
        self.cancel_fix_request();
    }

    fn publish(&self) {
        self.status_tx.send_replace(LiveStatus::from(&self.state));
    }
}

async fn acquire_seed(provider: &dyn PositionProvider) -> ProviderResult<TrackPoint> {
    provider.request_foreground_permission().await?;
    provider.current_position().await
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_point(updates: Option<&mut mpsc::UnboundedReceiver<TrackPoint>>) -> Option<TrackPoint> {
    match updates {
        Some(updates) => updates.recv().await,
        None => std::future::pending().await,
    }
}
