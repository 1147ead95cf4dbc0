//! Cooperative event loops for the GM and preview sessions.
//!
//! DESIGN
//! ======
//! Each loop is one task that exclusively owns its session, so no lock guards
//! the fog or camera. Timers (debounce deadline, reconciliation poll,
//! viewport report, navigation poll) are `select!` arms.
//!
//! The GM loop never awaits the network itself. Store calls run in spawned
//! tasks that post their result back on a channel; the owning task applies it
//! on its next turn. A poll result that arrives after a local edit is thus
//! re-checked against the throttle before anything is replaced.
//!
//! Batches and fog resets share one lane: at most one of them is in flight,
//! and a reset is sent only after the batch ahead of it has settled.
//!
//! ERROR HANDLING
//! ==============
//! Transient store failures are logged and left to the next natural cycle: a
//! failed flush partition or reset is re-queued, a failed poll simply waits
//! for the next tick. A request the store rejects (4xx, bad payload) is
//! dropped with an error log and the next poll pulls the store's view.
//! Nothing here ends the session except the event channel closing.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;

use std::future;
use std::sync::Arc;

use mapview::camera::{Camera, Point};
use mapview::fog::{FogAction, RevealedArea};
use mapview::nav::{NavEffect, NavigationCommand};
use mapview::render::BrushTool;
use mapview::viewport::ViewportDescriptor;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::gm::GmSession;
use crate::preview::PreviewSession;
use crate::store::{FogStore, MapConfigStore, NavigationChannel, ViewportTelemetry};
use crate::sync::{Delivery, FlushBatch, FlushReport, PollDecision, ReconcileOutcome};
use crate::tokens::TokenKind;

const RESULT_QUEUE_CAPACITY: usize = 32;

/// Input to the GM loop.
#[derive(Debug, Clone, PartialEq)]
pub enum GmEvent {
    /// Pointer down with a paint or erase tool.
    StrokeStart,
    /// Paint or erase at an image-space point.
    Edit { at: Point, action: FogAction },
    /// Paint or erase at a container-relative screen point.
    EditScreen { at: Point, action: FogAction },
    StrokeEnd,
    /// Switch the tool the hover highlight reflects.
    SetTool(BrushTool),
    /// Push a command to the preview's queue.
    Navigate(NavigationCommand),
    SetFrameEnabled(bool),
    ResetFog,
    /// Flush now, without waiting for the debounce.
    Flush,
    PlacePlayer(Point),
    PlaceEnemy(Point),
    MoveToken { from: Point, to: Point },
    RemoveToken(Point),
    RemoveLastToken(TokenKind),
    RemoveAllTokens(TokenKind),
    /// Persist the current camera and appearance settings.
    SaveSettings,
}

/// Store results posted back to the GM loop.
#[derive(Debug)]
enum TaskResult {
    Flushed { batch: FlushBatch, report: FlushReport },
    Reset(Delivery),
    Hash(Result<String, SessionError>),
    Snapshot(Result<Vec<RevealedArea>, SessionError>),
}

/// Store capabilities the GM loop talks to.
#[derive(Clone)]
pub struct GmBackends {
    pub fog: Arc<dyn FogStore>,
    pub nav: Arc<dyn NavigationChannel>,
    pub telemetry: Arc<dyn ViewportTelemetry>,
    pub config: Arc<dyn MapConfigStore>,
}

pub struct GmRuntime {
    session: GmSession,
    backends: GmBackends,
    config: SessionConfig,
    results_tx: mpsc::Sender<TaskResult>,
    results_rx: mpsc::Receiver<TaskResult>,
    poll_in_flight: bool,
}

impl GmRuntime {
    #[must_use]
    pub fn new(session: GmSession, backends: GmBackends, config: SessionConfig) -> Self {
        let (results_tx, results_rx) = mpsc::channel(RESULT_QUEUE_CAPACITY);
        Self { session, backends, config, results_tx, results_rx, poll_in_flight: false }
    }

    /// Run until `events` closes, then flush whatever is still queued and
    /// hand the session back.
    pub async fn run(mut self, mut events: mpsc::Receiver<GmEvent>) -> GmSession {
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        poll.reset();
        let mut report = interval(self.config.viewport_report);
        report.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(map = %self.session.map().name, "gm session started");
        loop {
            let deadline = self.session.sync().deadline();
            let flushing = self.session.sync().is_flushing();
            let reporting = self.session.frame_enabled();
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.handle_event(event);
                }
                Some(result) = self.results_rx.recv() => self.handle_result(result),
                () = until(deadline), if !flushing => self.start_flush(),
                _ = poll.tick() => self.start_poll(),
                _ = report.tick(), if reporting => self.report_viewport(),
            }
        }
        self.drain().await;
        info!(map = %self.session.map().name, "gm session stopped");
        self.session
    }

    fn handle_event(&mut self, event: GmEvent) {
        let now = Instant::now();
        match event {
            GmEvent::StrokeStart => self.session.begin_stroke(),
            GmEvent::StrokeEnd => self.session.end_stroke(),
            GmEvent::SetTool(tool) => self.session.set_tool(tool),
            GmEvent::Edit { at, action } => {
                let outcome = self.session.edit_at(at, action, now);
                if outcome.flush_now {
                    self.start_flush();
                }
            }
            GmEvent::EditScreen { at, action } => {
                if let Some(outcome) = self.session.edit_at_screen(at, action, now) {
                    if outcome.flush_now {
                        self.start_flush();
                    }
                }
            }
            GmEvent::Navigate(command) => {
                let nav = Arc::clone(&self.backends.nav);
                tokio::spawn(async move {
                    if let Err(e) = nav.enqueue(&command).await {
                        warn!(error = %e, "navigation enqueue failed");
                    }
                });
            }
            GmEvent::SetFrameEnabled(enabled) => {
                self.session.set_frame_enabled(enabled);
                let telemetry = Arc::clone(&self.backends.telemetry);
                tokio::spawn(async move {
                    if let Err(e) = telemetry.set_frame_enabled(enabled).await {
                        warn!(error = %e, enabled, "viewport frame toggle failed");
                    }
                });
            }
            GmEvent::ResetFog => {
                self.session.reset_fog(now);
                self.start_flush();
            }
            GmEvent::Flush => self.start_flush(),
            GmEvent::PlacePlayer(at) => {
                self.session.place_player(at);
                self.save_characters();
            }
            GmEvent::PlaceEnemy(at) => {
                let letter = self.session.place_enemy(at);
                debug!(map = %self.session.map().name, %letter, "enemy placed");
                self.save_characters();
            }
            GmEvent::MoveToken { from, to } => {
                if self.session.move_token(from, to) {
                    self.save_characters();
                }
            }
            GmEvent::RemoveToken(at) => {
                if self.session.remove_token(at) {
                    self.save_characters();
                }
            }
            GmEvent::RemoveLastToken(kind) => {
                if self.session.remove_last_token(kind) {
                    self.save_characters();
                }
            }
            GmEvent::RemoveAllTokens(kind) => {
                self.session.remove_all_tokens(kind);
                self.save_characters();
            }
            GmEvent::SaveSettings => {
                let settings = self.session.snapshot_settings();
                let store = Arc::clone(&self.backends.config);
                let map = self.session.map().name.clone();
                tokio::spawn(async move {
                    if let Err(e) = store.save_settings(&map, &settings).await {
                        warn!(%map, error = %e, "settings save failed");
                    }
                });
            }
        }
    }

    fn save_characters(&self) {
        let data = self.session.characters().clone();
        let store = Arc::clone(&self.backends.config);
        let map = self.session.map().name.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save_characters(&map, &data).await {
                warn!(%map, error = %e, "token save failed");
            }
        });
    }

    fn handle_result(&mut self, result: TaskResult) {
        let now = Instant::now();
        match result {
            TaskResult::Flushed { batch, report } => {
                let count = batch.len();
                let requeued = self.session.sync_mut().finish_flush(batch, report, now);
                if requeued > 0 {
                    warn!(map = %self.session.map().name, count, requeued, "fog flush partially failed; re-queued");
                } else {
                    debug!(map = %self.session.map().name, count, "fog flush complete");
                }
                if self.session.sync().flush_due(now) {
                    self.start_flush();
                }
            }
            TaskResult::Reset(delivery) => {
                self.session.sync_mut().finish_reset(delivery, now);
                if self.session.sync().flush_due(now) {
                    self.start_flush();
                }
            }
            TaskResult::Hash(Ok(remote)) => {
                let local = self.session.fog().hash().to_owned();
                match self.session.sync_mut().poll_decision(&remote, &local, now) {
                    PollDecision::Fetch => self.spawn_snapshot_fetch(),
                    PollDecision::Skip(reason) => {
                        debug!(map = %self.session.map().name, reason = reason.as_str(), "reconciliation skipped");
                        self.poll_in_flight = false;
                    }
                    PollDecision::Unchanged => self.poll_in_flight = false,
                }
            }
            TaskResult::Snapshot(Ok(areas)) => {
                self.poll_in_flight = false;
                let count = areas.len();
                let (fog, sync) = self.session.fog_and_sync();
                match sync.reconcile(fog, areas, now) {
                    ReconcileOutcome::Replaced => {
                        info!(map = %self.session.map().name, count, "fog replaced from store");
                    }
                    ReconcileOutcome::Discarded(reason) => {
                        debug!(map = %self.session.map().name, reason = reason.as_str(), "late snapshot discarded");
                    }
                }
            }
            TaskResult::Hash(Err(e)) | TaskResult::Snapshot(Err(e)) => {
                self.poll_in_flight = false;
                warn!(map = %self.session.map().name, error = %e, "fog poll failed");
            }
        }
    }

    /// Start the next job on the flush lane: a scheduled reset first, then
    /// the next batch.
    fn start_flush(&mut self) {
        let fog = Arc::clone(&self.backends.fog);
        let map = self.session.map().name.clone();
        let tx = self.results_tx.clone();
        if self.session.sync_mut().take_reset() {
            tokio::spawn(async move {
                let delivery = send_reset(fog.as_ref(), &map).await;
                if tx.send(TaskResult::Reset(delivery)).await.is_err() {
                    debug!(%map, "gm loop gone; reset result dropped");
                }
            });
            return;
        }
        let Some(batch) = self.session.sync_mut().take_batch() else {
            return;
        };
        tokio::spawn(async move {
            let report = send_batch(fog.as_ref(), &map, &batch).await;
            if tx.send(TaskResult::Flushed { batch, report }).await.is_err() {
                debug!(%map, "gm loop gone; flush result dropped");
            }
        });
    }

    fn start_poll(&mut self) {
        if self.poll_in_flight {
            return;
        }
        // Don't spend a request while the throttle is certainly closed.
        if let Some(reason) = self.session.sync().blocker(Instant::now()) {
            debug!(map = %self.session.map().name, reason = reason.as_str(), "reconciliation skipped");
            return;
        }
        self.poll_in_flight = true;
        let fog = Arc::clone(&self.backends.fog);
        let map = self.session.map().name.clone();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = fog.fog_hash(&map).await;
            if tx.send(TaskResult::Hash(result)).await.is_err() {
                debug!(%map, "gm loop gone; hash dropped");
            }
        });
    }

    fn spawn_snapshot_fetch(&self) {
        let fog = Arc::clone(&self.backends.fog);
        let map = self.session.map().name.clone();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = fog.load_fog(&map).await;
            if tx.send(TaskResult::Snapshot(result)).await.is_err() {
                debug!(%map, "gm loop gone; snapshot dropped");
            }
        });
    }

    fn report_viewport(&self) {
        let Some(viewport) = self.session.viewport() else {
            return;
        };
        let telemetry = Arc::clone(&self.backends.telemetry);
        tokio::spawn(async move {
            if let Err(e) = telemetry.report(&viewport).await {
                debug!(error = %e, "viewport report failed");
            }
        });
    }

    /// Settle whatever is in flight, then push the rest of the lane in order.
    /// Stops at the first transient failure.
    async fn drain(&mut self) {
        while self.session.sync().is_flushing() {
            match self.results_rx.recv().await {
                Some(TaskResult::Flushed { batch, report }) => {
                    self.session.sync_mut().finish_flush(batch, report, Instant::now());
                }
                Some(TaskResult::Reset(delivery)) => {
                    self.session.sync_mut().finish_reset(delivery, Instant::now());
                }
                Some(_) => {}
                None => break,
            }
        }
        let map = self.session.map().name.clone();
        loop {
            if self.session.sync_mut().take_reset() {
                let delivery = send_reset(self.backends.fog.as_ref(), &map).await;
                self.session.sync_mut().finish_reset(delivery, Instant::now());
                if delivery == Delivery::Retry {
                    warn!(%map, "final fog reset failed; store not cleared");
                    return;
                }
                continue;
            }
            let Some(batch) = self.session.sync_mut().take_batch() else {
                return;
            };
            let report = send_batch(self.backends.fog.as_ref(), &map, &batch).await;
            let count = batch.len();
            let requeued = self.session.sync_mut().finish_flush(batch, report, Instant::now());
            if requeued > 0 {
                warn!(%map, count, requeued, "final fog flush failed; edits not persisted");
                return;
            }
        }
    }
}

/// Send each non-empty partition to its batch endpoint.
pub async fn send_batch(fog: &dyn FogStore, map: &str, batch: &FlushBatch) -> FlushReport {
    let mut report = FlushReport::OK;
    if !batch.reveal.is_empty() {
        let result = fog.reveal_batch(map, &batch.reveal_areas()).await;
        report.reveal = delivery(result, map, "reveal batch", batch.reveal.len());
    }
    if !batch.hide.is_empty() {
        let result = fog.hide_batch(map, &batch.hide_areas()).await;
        report.hide = delivery(result, map, "hide batch", batch.hide.len());
    }
    report
}

async fn send_reset(fog: &dyn FogStore, map: &str) -> Delivery {
    let result = fog.reset_fog(map).await;
    let delivery = delivery(result, map, "fog reset", 0);
    if delivery == Delivery::Sent {
        info!(%map, "fog reset");
    }
    delivery
}

/// Classify a store result: transient failures are retried, anything else
/// the store refused is dropped.
fn delivery(result: Result<(), SessionError>, map: &str, request: &str, count: usize) -> Delivery {
    match result {
        Ok(()) => Delivery::Sent,
        Err(e) if e.is_transient() => {
            warn!(%map, request, count, error = %e, "store request failed; will retry");
            Delivery::Retry
        }
        Err(e) => {
            error!(%map, request, count, error = %e, "store rejected request; dropped");
            Delivery::Rejected
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}

// =============================================================================
// PREVIEW
// =============================================================================

/// What the preview loop tells its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewUpdate {
    Camera(Camera),
    /// Fog replaced from the store; carries the new hash.
    Fog(String),
    Viewport(Option<ViewportDescriptor>),
    /// A reload command was applied: fog re-fetched unconditionally.
    Reloaded,
}

/// Why the preview loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewExit {
    /// The GM selected another map for the preview.
    MapChanged(Option<String>),
    /// The update receiver was dropped.
    Closed,
}

enum PreviewTick {
    Navigation,
    Store,
}

pub struct PreviewRuntime {
    session: PreviewSession,
    fog: Arc<dyn FogStore>,
    nav: Arc<dyn NavigationChannel>,
    telemetry: Option<Arc<dyn ViewportTelemetry>>,
    config: SessionConfig,
}

impl PreviewRuntime {
    #[must_use]
    pub fn new(
        session: PreviewSession,
        fog: Arc<dyn FogStore>,
        nav: Arc<dyn NavigationChannel>,
        config: SessionConfig,
    ) -> Self {
        Self { session, fog, nav, telemetry: None, config }
    }

    /// Also follow GM viewport telemetry on the poll cadence.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn ViewportTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    #[must_use]
    pub fn session(&self) -> &PreviewSession {
        &self.session
    }

    /// Load the initial fog; failure leaves the map fully fogged.
    pub async fn load(&mut self) {
        let map = self.session.map().name.clone();
        match self.fog.load_fog(&map).await {
            Ok(areas) => self.session.load_fog(areas),
            Err(e) => warn!(%map, error = %e, "initial fog load failed; showing full fog"),
        }
    }

    /// Poll the command slot and the fog hash until the consumer goes away
    /// or the preview is pointed at another map.
    pub async fn run(mut self, updates: mpsc::Sender<PreviewUpdate>) -> PreviewExit {
        let mut nav_tick = interval(self.config.nav_poll);
        nav_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        poll.reset();

        info!(map = %self.session.map().name, "preview session started");
        loop {
            let tick = tokio::select! {
                () = updates.closed() => return PreviewExit::Closed,
                _ = nav_tick.tick() => PreviewTick::Navigation,
                _ = poll.tick() => PreviewTick::Store,
            };
            match tick {
                PreviewTick::Navigation => {
                    if !self.poll_navigation(&updates).await {
                        return PreviewExit::Closed;
                    }
                }
                PreviewTick::Store => {
                    if let Some(exit) = self.poll_store(&updates).await {
                        return exit;
                    }
                }
            }
        }
    }

    /// Dequeue and apply at most one command. Returns false once the
    /// consumer is gone.
    async fn poll_navigation(&mut self, updates: &mpsc::Sender<PreviewUpdate>) -> bool {
        let command = match self.nav.dequeue().await {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(e) => {
                debug!(error = %e, "navigation poll failed");
                return true;
            }
        };
        debug!(?command, "navigation command consumed");
        let update = match self.session.apply_command(&command) {
            NavEffect::CameraChanged => PreviewUpdate::Camera(*self.session.camera()),
            NavEffect::Reload => {
                let map = self.session.map().name.clone();
                match self.fog.load_fog(&map).await {
                    Ok(areas) => self.session.load_fog(areas),
                    Err(e) => warn!(%map, error = %e, "reload fog fetch failed"),
                }
                PreviewUpdate::Reloaded
            }
            NavEffect::Ignored => return true,
        };
        updates.send(update).await.is_ok()
    }

    /// Reconciliation cadence: selection check, refresh flag, hash poll and
    /// telemetry.
    async fn poll_store(&mut self, updates: &mpsc::Sender<PreviewUpdate>) -> Option<PreviewExit> {
        let map = self.session.map().name.clone();
        match self.nav.preview_map().await {
            Ok(selected) if selected.as_deref() != Some(map.as_str()) => {
                info!(%map, next = ?selected, "preview map changed");
                return Some(PreviewExit::MapChanged(selected));
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "preview selection poll failed"),
        }

        let refresh = match self.nav.take_refresh().await {
            Ok(flag) => flag,
            Err(e) => {
                debug!(error = %e, "refresh flag poll failed");
                false
            }
        };
        let fetch = refresh
            || match self.fog.fog_hash(&map).await {
                Ok(remote) => self.session.needs_fetch(&remote),
                Err(e) => {
                    warn!(%map, error = %e, "fog hash poll failed");
                    false
                }
            };
        if fetch {
            match self.fog.load_fog(&map).await {
                Ok(areas) => {
                    self.session.load_fog(areas);
                    let hash = self.session.fog().hash().to_owned();
                    info!(%map, count = self.session.fog().len(), "preview fog updated");
                    if updates.send(PreviewUpdate::Fog(hash)).await.is_err() {
                        return Some(PreviewExit::Closed);
                    }
                }
                Err(e) => warn!(%map, error = %e, "preview fog fetch failed"),
            }
        }

        if let Some(telemetry) = &self.telemetry {
            match telemetry.latest().await {
                Ok(viewport) => {
                    if self.session.set_telemetry(viewport)
                        && updates.send(PreviewUpdate::Viewport(self.session.telemetry().copied())).await.is_err()
                    {
                        return Some(PreviewExit::Closed);
                    }
                }
                Err(e) => debug!(error = %e, "viewport telemetry poll failed"),
            }
        }
        None
    }
}
