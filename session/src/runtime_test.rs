#![allow(clippy::float_cmp)]

use super::*;
use std::sync::Mutex;
use std::time::Duration;

use mapview::camera::Size;
use mapview::fog::FogState;
use mapview::map::MapDescriptor;
use mapview::nav::Direction;
use wire::{CharacterData, GridConfigDto, MapSettings, PreviewStatus};

use crate::tokens::TokenKind;

// =============================================================================
// MOCK STORE
// =============================================================================

#[derive(Default)]
struct MockStore {
    fog: Mutex<FogState>,
    reveal_calls: Mutex<Vec<Vec<RevealedArea>>>,
    hide_calls: Mutex<Vec<Vec<RevealedArea>>>,
    fail_reveal: Mutex<bool>,
    reject_reveal: Mutex<bool>,
    reveal_delay: Mutex<Option<Duration>>,
    reset_calls: Mutex<usize>,
    load_calls: Mutex<usize>,
    load_delay: Mutex<Option<Duration>>,
    slot: Mutex<Option<NavigationCommand>>,
    preview_map: Mutex<Option<String>>,
    reports: Mutex<Vec<ViewportDescriptor>>,
    frame: Mutex<bool>,
    character_saves: Mutex<Vec<CharacterData>>,
    settings_saves: Mutex<Vec<MapSettings>>,
}

impl MockStore {
    fn with_preview(map: &str) -> Self {
        let store = Self::default();
        *store.preview_map.lock().unwrap() = Some(map.to_owned());
        store
    }
}

#[async_trait::async_trait]
impl FogStore for MockStore {
    async fn load_fog(&self, _map: &str) -> Result<Vec<RevealedArea>, SessionError> {
        *self.load_calls.lock().unwrap() += 1;
        let delay = *self.load_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.fog.lock().unwrap().areas().to_vec())
    }

    async fn fog_hash(&self, _map: &str) -> Result<String, SessionError> {
        Ok(self.fog.lock().unwrap().hash().to_owned())
    }

    async fn reveal_batch(&self, _map: &str, areas: &[RevealedArea]) -> Result<(), SessionError> {
        self.reveal_calls.lock().unwrap().push(areas.to_vec());
        let delay = *self.reveal_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_reveal.lock().unwrap() {
            return Err(SessionError::Status { status: 503, body: "busy".into() });
        }
        if *self.reject_reveal.lock().unwrap() {
            return Err(SessionError::Status { status: 400, body: "bad area".into() });
        }
        self.fog.lock().unwrap().reveal_all(areas);
        Ok(())
    }

    async fn hide_batch(&self, _map: &str, areas: &[RevealedArea]) -> Result<(), SessionError> {
        self.hide_calls.lock().unwrap().push(areas.to_vec());
        self.fog.lock().unwrap().hide_all(areas);
        Ok(())
    }

    async fn reset_fog(&self, _map: &str) -> Result<(), SessionError> {
        *self.reset_calls.lock().unwrap() += 1;
        self.fog.lock().unwrap().reset();
        Ok(())
    }
}

#[async_trait::async_trait]
impl NavigationChannel for MockStore {
    async fn enqueue(&self, command: &NavigationCommand) -> Result<(), SessionError> {
        *self.slot.lock().unwrap() = Some(*command);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<NavigationCommand>, SessionError> {
        Ok(self.slot.lock().unwrap().take())
    }

    async fn preview_map(&self) -> Result<Option<String>, SessionError> {
        Ok(self.preview_map.lock().unwrap().clone())
    }

    async fn set_preview_map(&self, map: &str) -> Result<(), SessionError> {
        *self.preview_map.lock().unwrap() = Some(map.to_owned());
        Ok(())
    }

    async fn take_refresh(&self) -> Result<bool, SessionError> {
        Ok(false)
    }

    async fn status(&self) -> Result<PreviewStatus, SessionError> {
        Ok(PreviewStatus {
            map_name: self.preview_map.lock().unwrap().clone(),
            viewport_frame_enabled: *self.frame.lock().unwrap(),
            refresh_requested: false,
            pending_command: self.slot.lock().unwrap().is_some(),
        })
    }
}

#[async_trait::async_trait]
impl ViewportTelemetry for MockStore {
    async fn report(&self, viewport: &ViewportDescriptor) -> Result<(), SessionError> {
        self.reports.lock().unwrap().push(*viewport);
        Ok(())
    }

    async fn latest(&self) -> Result<Option<ViewportDescriptor>, SessionError> {
        Ok(self.reports.lock().unwrap().last().copied())
    }

    async fn set_frame_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        *self.frame.lock().unwrap() = enabled;
        Ok(())
    }

    async fn frame_enabled(&self) -> Result<bool, SessionError> {
        Ok(*self.frame.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl MapConfigStore for MockStore {
    async fn load_grid(&self, _map: &str) -> Result<Option<GridConfigDto>, SessionError> {
        Ok(None)
    }

    async fn save_grid(&self, _map: &str, _grid: &GridConfigDto) -> Result<(), SessionError> {
        Ok(())
    }

    async fn clear_grid(&self, _map: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn load_settings(&self, _map: &str) -> Result<Option<MapSettings>, SessionError> {
        Ok(self.settings_saves.lock().unwrap().last().cloned())
    }

    async fn save_settings(&self, _map: &str, settings: &MapSettings) -> Result<(), SessionError> {
        self.settings_saves.lock().unwrap().push(settings.clone());
        Ok(())
    }

    async fn load_characters(&self, _map: &str) -> Result<Option<CharacterData>, SessionError> {
        Ok(self.character_saves.lock().unwrap().last().cloned())
    }

    async fn save_characters(&self, _map: &str, data: &CharacterData) -> Result<(), SessionError> {
        self.character_saves.lock().unwrap().push(data.clone());
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn config() -> SessionConfig {
    SessionConfig { poll_interval: Duration::from_millis(500), ..SessionConfig::default() }
}

fn gm_session(config: &SessionConfig) -> GmSession {
    let map = MapDescriptor::new("cave.png", 800.0, 600.0).unwrap();
    let mut gm = GmSession::new(map, Size::new(800.0, 600.0), config);
    gm.load_grid(Some(&GridConfigDto {
        grid_size: 100.0,
        offset_x: 0.0,
        offset_y: 0.0,
        line_width: None,
        calibrated: true,
    }));
    gm.load_fog(Vec::new());
    gm
}

fn start_gm(
    store: &Arc<MockStore>,
    session: GmSession,
    config: SessionConfig,
) -> (mpsc::Sender<GmEvent>, tokio::task::JoinHandle<GmSession>) {
    let backends =
        GmBackends { fog: store.clone(), nav: store.clone(), telemetry: store.clone(), config: store.clone() };
    let (tx, rx) = mpsc::channel(64);
    let handle = tokio::spawn(GmRuntime::new(session, backends, config).run(rx));
    (tx, handle)
}

async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn erase(x: f64, y: f64) -> GmEvent {
    GmEvent::Edit { at: Point::new(x, y), action: FogAction::Reveal }
}

fn paint(x: f64, y: f64) -> GmEvent {
    GmEvent::Edit { at: Point::new(x, y), action: FogAction::Hide }
}

// =============================================================================
// FLUSH
// =============================================================================

#[tokio::test(start_paused = true)]
async fn brush_stroke_is_sent_as_one_batch_after_debounce() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    advance_ms(399).await;
    assert!(store.reveal_calls.lock().unwrap().is_empty(), "debounce not yet elapsed");

    advance_ms(2).await;
    {
        let calls = store.reveal_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 9);
        assert!(calls[0].iter().all(|a| a.radius == 50.0 && a.is_grid_cell));
    }
    assert!(store.hide_calls.lock().unwrap().is_empty());

    drop(tx);
    let gm = handle.await.unwrap();
    assert_eq!(gm.fog().hash(), store.fog.lock().unwrap().hash());
}

#[tokio::test(start_paused = true)]
async fn debounce_restarts_on_each_edit() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    advance_ms(300).await;
    tx.send(erase(550.0, 250.0)).await.unwrap();
    advance_ms(300).await;
    assert!(store.reveal_calls.lock().unwrap().is_empty());

    advance_ms(150).await;
    {
        let calls = store.reveal_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 18);
    }
    drop(tx);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn threshold_flushes_without_waiting() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let mut gm = gm_session(&cfg);
    gm.set_brush(1);
    let (tx, handle) = start_gm(&store, gm, cfg);

    for row in 0..6 {
        for col in 0..5 {
            tx.send(erase(f64::from(col) * 100.0 + 50.0, f64::from(row) * 100.0 + 50.0)).await.unwrap();
        }
    }
    advance_ms(1).await;
    {
        let calls = store.reveal_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 30);
    }
    drop(tx);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn paint_and_erase_go_to_separate_endpoints() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let mut gm = gm_session(&cfg);
    gm.set_brush(1);
    let (tx, handle) = start_gm(&store, gm, cfg);

    tx.send(erase(50.0, 50.0)).await.unwrap();
    tx.send(GmEvent::Edit { at: Point::new(250.0, 250.0), action: FogAction::Hide }).await.unwrap();
    advance_ms(401).await;

    assert_eq!(store.reveal_calls.lock().unwrap().len(), 1);
    assert_eq!(store.hide_calls.lock().unwrap().len(), 1);
    drop(tx);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_partition_is_retried_on_next_cycle() {
    let store = Arc::new(MockStore::default());
    *store.fail_reveal.lock().unwrap() = true;
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    advance_ms(401).await;
    assert_eq!(store.reveal_calls.lock().unwrap().len(), 1);
    assert!(store.fog.lock().unwrap().is_empty());

    *store.fail_reveal.lock().unwrap() = false;
    advance_ms(400).await;
    assert_eq!(store.reveal_calls.lock().unwrap().len(), 2);
    assert_eq!(store.fog.lock().unwrap().len(), 9);

    drop(tx);
    let gm = handle.await.unwrap();
    assert!(gm.sync().pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn paint_then_erase_on_one_cell_leaves_it_revealed() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let mut gm = gm_session(&cfg);
    gm.set_brush(1);
    let (tx, handle) = start_gm(&store, gm, cfg);

    tx.send(paint(50.0, 50.0)).await.unwrap();
    tx.send(erase(50.0, 50.0)).await.unwrap();
    advance_ms(410).await;
    assert_eq!(store.hide_calls.lock().unwrap().len(), 1);
    assert_eq!(store.reveal_calls.lock().unwrap().len(), 1);
    assert_eq!(store.fog.lock().unwrap().len(), 1);

    // Later polls find nothing to reconcile.
    advance_ms(3000).await;
    drop(tx);
    let gm = handle.await.unwrap();
    assert_eq!(gm.fog().len(), 1);
    assert_eq!(gm.fog().hash(), store.fog.lock().unwrap().hash());
}

#[tokio::test(start_paused = true)]
async fn erase_then_paint_on_one_cell_leaves_it_hidden() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let mut gm = gm_session(&cfg);
    gm.set_brush(1);
    let (tx, handle) = start_gm(&store, gm, cfg);

    tx.send(erase(50.0, 50.0)).await.unwrap();
    tx.send(paint(50.0, 50.0)).await.unwrap();
    advance_ms(410).await;
    assert_eq!(store.reveal_calls.lock().unwrap().len(), 1);
    assert_eq!(store.hide_calls.lock().unwrap().len(), 1);
    assert!(store.fog.lock().unwrap().is_empty());

    advance_ms(3000).await;
    drop(tx);
    let gm = handle.await.unwrap();
    assert!(gm.fog().is_empty());
    assert_eq!(gm.fog().hash(), store.fog.lock().unwrap().hash());
}

#[tokio::test(start_paused = true)]
async fn rejected_batch_is_dropped_and_polling_resumes() {
    let store = Arc::new(MockStore::default());
    *store.reject_reveal.lock().unwrap() = true;
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    advance_ms(3000).await;
    assert_eq!(store.reveal_calls.lock().unwrap().len(), 1);
    assert!(*store.load_calls.lock().unwrap() >= 1);

    drop(tx);
    let gm = handle.await.unwrap();
    assert!(gm.sync().pending().is_empty());
    // The store's empty fog won.
    assert!(gm.fog().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reset_during_failing_flush_is_not_undone() {
    let store = Arc::new(MockStore::default());
    *store.fail_reveal.lock().unwrap() = true;
    *store.reveal_delay.lock().unwrap() = Some(Duration::from_millis(100));
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    // Batch leaves at 400 ms and fails at 500 ms.
    advance_ms(450).await;
    tx.send(GmEvent::ResetFog).await.unwrap();
    advance_ms(60).await;
    assert_eq!(*store.reset_calls.lock().unwrap(), 1);

    *store.fail_reveal.lock().unwrap() = false;
    advance_ms(3000).await;
    assert_eq!(store.reveal_calls.lock().unwrap().len(), 1);
    assert!(store.fog.lock().unwrap().is_empty());

    drop(tx);
    let gm = handle.await.unwrap();
    assert!(gm.fog().is_empty());
    assert!(gm.sync().pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reset_is_sent_after_the_batch_in_flight() {
    let store = Arc::new(MockStore::default());
    *store.reveal_delay.lock().unwrap() = Some(Duration::from_millis(100));
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    advance_ms(450).await;
    tx.send(GmEvent::ResetFog).await.unwrap();
    advance_ms(10).await;
    assert_eq!(*store.reset_calls.lock().unwrap(), 0, "reset waits for the batch");

    advance_ms(100).await;
    assert_eq!(*store.reset_calls.lock().unwrap(), 1);
    assert!(store.fog.lock().unwrap().is_empty());

    drop(tx);
    let gm = handle.await.unwrap();
    assert!(gm.fog().is_empty());
}

#[tokio::test(start_paused = true)]
async fn closing_the_session_flushes_pending_edits() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    drop(tx);
    let gm = handle.await.unwrap();

    assert_eq!(store.reveal_calls.lock().unwrap().len(), 1);
    assert_eq!(gm.fog().hash(), store.fog.lock().unwrap().hash());
}

// =============================================================================
// RECONCILIATION
// =============================================================================

fn remote_only_area() -> RevealedArea {
    RevealedArea { x: 750.0, y: 550.0, radius: 50.0, is_grid_cell: true }
}

#[tokio::test(start_paused = true)]
async fn poll_inside_staleness_window_leaves_local_fog_alone() {
    let store = Arc::new(MockStore::default());
    store.fog.lock().unwrap().reveal(remote_only_area());
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(erase(150.0, 250.0)).await.unwrap();
    // Flushed at 400 ms; polls at 500..1500 ms fall inside the 2 s window.
    advance_ms(1999).await;
    assert_eq!(*store.load_calls.lock().unwrap(), 0);

    // First poll after the window pulls the remote snapshot.
    advance_ms(100).await;
    assert_eq!(*store.load_calls.lock().unwrap(), 1);

    drop(tx);
    let gm = handle.await.unwrap();
    assert_eq!(gm.fog().len(), 10);
    assert!(gm.fog().areas().contains(&remote_only_area()));
}

#[tokio::test(start_paused = true)]
async fn active_stroke_blocks_reconciliation() {
    let store = Arc::new(MockStore::default());
    store.fog.lock().unwrap().reveal(remote_only_area());
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(GmEvent::StrokeStart).await.unwrap();
    advance_ms(3000).await;
    assert_eq!(*store.load_calls.lock().unwrap(), 0);

    tx.send(GmEvent::StrokeEnd).await.unwrap();
    advance_ms(501).await;
    assert_eq!(*store.load_calls.lock().unwrap(), 1);

    drop(tx);
    let gm = handle.await.unwrap();
    assert_eq!(gm.fog().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn snapshot_arriving_after_an_edit_is_discarded() {
    let store = Arc::new(MockStore::default());
    store.fog.lock().unwrap().reveal(remote_only_area());
    *store.load_delay.lock().unwrap() = Some(Duration::from_millis(300));
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    // Poll at 500 ms sees a new hash and starts a slow fetch.
    advance_ms(600).await;
    assert_eq!(*store.load_calls.lock().unwrap(), 1);

    // Edit while the snapshot is in flight; it lands at 800 ms.
    tx.send(erase(150.0, 250.0)).await.unwrap();
    advance_ms(250).await;

    drop(tx);
    let gm = handle.await.unwrap();
    assert!(!gm.fog().areas().contains(&remote_only_area()));
    assert_eq!(gm.fog().len(), 9);
}

// =============================================================================
// NAVIGATION AND TELEMETRY
// =============================================================================

#[tokio::test(start_paused = true)]
async fn navigate_fills_the_command_slot() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    tx.send(GmEvent::Navigate(NavigationCommand::Pan { direction: Direction::Up })).await.unwrap();
    tx.send(GmEvent::Navigate(NavigationCommand::Center)).await.unwrap();
    advance_ms(1).await;
    assert_eq!(*store.slot.lock().unwrap(), Some(NavigationCommand::Center), "last write wins");

    drop(tx);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn viewport_is_reported_only_while_enabled() {
    let store = Arc::new(MockStore::default());
    let cfg = config();
    let (tx, handle) = start_gm(&store, gm_session(&cfg), cfg);

    advance_ms(1100).await;
    assert!(store.reports.lock().unwrap().is_empty());

    tx.send(GmEvent::SetFrameEnabled(true)).await.unwrap();
    advance_ms(1100).await;
    assert!(*store.frame.lock().unwrap());
    let count = store.reports.lock().unwrap().len();
    assert!(count >= 2, "expected periodic reports, got {count}");
    assert_eq!(store.reports.lock().unwrap()[0].map_width, 800.0);

    tx.send(GmEvent::SetFrameEnabled(false)).await.unwrap();
    advance_ms(1).await;
    let frozen = store.reports.lock().unwrap().len();
    advance_ms(2000).await;
    assert_eq!(store.reports.lock().unwrap().len(), frozen);

    drop(tx);
    handle.await.unwrap();
}

// =============================================================================
// TOKENS AND SETTINGS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn token_changes_are_pushed_to_the_store() {
    let store = Arc::new(MockStore::default());
    let config = config();
    let (tx, handle) = start_gm(&store, gm_session(&config), config);

    tx.send(GmEvent::PlacePlayer(Point::new(120.0, 130.0))).await.unwrap();
    tx.send(GmEvent::PlaceEnemy(Point::new(350.0, 250.0))).await.unwrap();
    advance_ms(10).await;
    {
        let saves = store.character_saves.lock().unwrap();
        assert_eq!(saves.len(), 2);
        let last = saves.last().unwrap();
        assert_eq!(last.characters.players.len(), 1);
        assert_eq!(last.characters.players[0].x, 150.0);
        assert_eq!(last.characters.enemies[0].letter, "A");
    }

    // A miss changes nothing and pushes nothing.
    tx.send(GmEvent::RemoveToken(Point::new(750.0, 550.0))).await.unwrap();
    tx.send(GmEvent::RemoveLastToken(TokenKind::Enemy)).await.unwrap();
    advance_ms(10).await;
    {
        let saves = store.character_saves.lock().unwrap();
        assert_eq!(saves.len(), 3);
        assert!(saves.last().unwrap().characters.enemies.is_empty());
    }

    drop(tx);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn clearing_a_token_kind_is_pushed_and_tool_switches() {
    let store = Arc::new(MockStore::default());
    let config = config();
    let (tx, handle) = start_gm(&store, gm_session(&config), config);

    tx.send(GmEvent::PlacePlayer(Point::new(50.0, 50.0))).await.unwrap();
    tx.send(GmEvent::PlacePlayer(Point::new(250.0, 50.0))).await.unwrap();
    tx.send(GmEvent::PlaceEnemy(Point::new(450.0, 50.0))).await.unwrap();
    tx.send(GmEvent::RemoveAllTokens(TokenKind::Player)).await.unwrap();
    tx.send(GmEvent::SetTool(BrushTool::Paint)).await.unwrap();
    advance_ms(10).await;
    {
        let saves = store.character_saves.lock().unwrap();
        assert_eq!(saves.len(), 4);
        let last = &saves.last().unwrap().characters;
        assert!(last.players.is_empty());
        assert_eq!(last.enemies.len(), 1);
    }

    drop(tx);
    let gm = handle.await.unwrap();
    assert_eq!(gm.tool(), BrushTool::Paint);
}

#[tokio::test(start_paused = true)]
async fn save_settings_snapshots_the_camera() {
    let store = Arc::new(MockStore::default());
    let config = config();
    let (tx, handle) = start_gm(&store, gm_session(&config), config);

    tx.send(GmEvent::SaveSettings).await.unwrap();
    advance_ms(10).await;
    let saves = store.settings_saves.lock().unwrap().clone();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].zoom, Some(1.0));
    assert_eq!(saves[0].rotation, Some(0.0));

    drop(tx);
    handle.await.unwrap();
}

// =============================================================================
// PREVIEW
// =============================================================================

fn preview_runtime(store: &Arc<MockStore>) -> PreviewRuntime {
    let map = MapDescriptor::new("cave.png", 800.0, 600.0).unwrap();
    let session = PreviewSession::new(map, Size::new(800.0, 600.0), &config());
    PreviewRuntime::new(session, store.clone(), store.clone(), config()).with_telemetry(store.clone())
}

#[tokio::test(start_paused = true)]
async fn preview_applies_one_queued_command_to_its_own_camera() {
    let store = Arc::new(MockStore::with_preview("cave.png"));
    *store.slot.lock().unwrap() = Some(NavigationCommand::Pan { direction: Direction::Left });
    let (tx, mut rx) = mpsc::channel(8);
    let runtime = tokio::spawn(preview_runtime(&store).run(tx));

    let update = rx.recv().await.unwrap();
    let PreviewUpdate::Camera(camera) = update else {
        panic!("expected camera update, got {update:?}");
    };
    assert_eq!((camera.pan_x, camera.pan_y), (100.0, 0.0));
    assert!(store.slot.lock().unwrap().is_none(), "command consumed");

    drop(rx);
    assert_eq!(runtime.await.unwrap(), PreviewExit::Closed);
}

#[tokio::test(start_paused = true)]
async fn preview_follows_remote_fog() {
    let store = Arc::new(MockStore::with_preview("cave.png"));
    let (tx, mut rx) = mpsc::channel(8);
    let runtime = tokio::spawn(preview_runtime(&store).run(tx));

    store.fog.lock().unwrap().reveal(remote_only_area());
    let expected = store.fog.lock().unwrap().hash().to_owned();
    let update = rx.recv().await.unwrap();
    assert_eq!(update, PreviewUpdate::Fog(expected));

    drop(rx);
    runtime.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn preview_exits_when_gm_selects_another_map() {
    let store = Arc::new(MockStore::with_preview("cave.png"));
    let (tx, _rx) = mpsc::channel(8);
    let runtime = tokio::spawn(preview_runtime(&store).run(tx));

    advance_ms(100).await;
    *store.preview_map.lock().unwrap() = Some("tower.png".into());
    let exit = runtime.await.unwrap();
    assert_eq!(exit, PreviewExit::MapChanged(Some("tower.png".into())));
}
