//! GM session context.
//!
//! DESIGN
//! ======
//! One `GmSession` per loaded map. It owns the camera, grid, fog, sync engine,
//! tokens and appearance settings, and is passed by reference to whatever
//! needs them. Nothing in here performs I/O: an edit is applied to the local
//! fog and queued on the sync engine in the same call, and the runtime decides
//! when to talk to the store. The local view is therefore always at least as
//! fresh as the remote one.

#[cfg(test)]
#[path = "gm_test.rs"]
mod gm_test;

use mapview::camera::{Camera, Point, Size, Stage};
use mapview::consts::{DEFAULT_FOG_COLOR, DEFAULT_FREEHAND_RADIUS, DEFAULT_GM_FOG_OPACITY};
use mapview::fog::{FogAction, FogEdit, FogState, RevealedArea};
use mapview::grid::{GridConfig, GridError, GridIndex};
use mapview::map::MapDescriptor;
use mapview::nav::{NavEffect, NavigationCommand};
use mapview::render::{
    BrushHighlight, BrushTool, FogLayerPlan, GridLines, Rgba, brush_highlight, grid_lines, hex_to_rgba, plan_fog_layer,
};
use mapview::viewport::ViewportDescriptor;
use tokio::time::Instant;
use tracing::warn;
use wire::{CharacterData, GridConfigDto, MapSettings};

use crate::config::SessionConfig;
use crate::sync::{QueueOutcome, SyncConfig, SyncEngine};
use crate::tokens::{self, TokenKind};

/// Result of one paint or erase at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditOutcome {
    /// Regions the brush produced (cells, or one freehand circle).
    pub regions: usize,
    /// Whether local fog changed.
    pub changed: bool,
    /// The queue hit its threshold; flush now.
    pub flush_now: bool,
}

#[derive(Debug)]
pub struct GmSession {
    map: MapDescriptor,
    camera: Camera,
    stage: Stage,
    grid: Option<GridIndex>,
    fog: FogState,
    sync: SyncEngine,
    brush: u32,
    tool: BrushTool,
    settings: MapSettings,
    characters: CharacterData,
    frame_enabled: bool,
    pan_step: f64,
}

impl GmSession {
    #[must_use]
    pub fn new(map: MapDescriptor, container: Size, config: &SessionConfig) -> Self {
        let stage = Stage::new(container, map.size());
        Self {
            map,
            camera: Camera::default(),
            stage,
            grid: None,
            fog: FogState::new(),
            sync: SyncEngine::new(SyncConfig::from(config)),
            brush: config.brush_size.max(1),
            tool: BrushTool::Erase,
            settings: MapSettings::default(),
            characters: CharacterData::default(),
            frame_enabled: false,
            pan_step: config.pan_step_px,
        }
    }

    #[must_use]
    pub fn map(&self) -> &MapDescriptor {
        &self.map
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[must_use]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn set_container(&mut self, container: Size) {
        self.stage = Stage::new(container, self.map.size());
    }

    #[must_use]
    pub fn fog(&self) -> &FogState {
        &self.fog
    }

    #[must_use]
    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncEngine {
        &mut self.sync
    }

    /// Fog and sync engine together, for reconciliation.
    pub fn fog_and_sync(&mut self) -> (&mut FogState, &mut SyncEngine) {
        (&mut self.fog, &mut self.sync)
    }

    #[must_use]
    pub fn grid(&self) -> Option<&GridIndex> {
        self.grid.as_ref()
    }

    #[must_use]
    pub fn brush(&self) -> u32 {
        self.brush
    }

    pub fn set_brush(&mut self, brush: u32) {
        self.brush = brush.max(1);
    }

    #[must_use]
    pub fn tool(&self) -> BrushTool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: BrushTool) {
        self.tool = tool;
    }

    #[must_use]
    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }

    #[must_use]
    pub fn characters(&self) -> &CharacterData {
        &self.characters
    }

    #[must_use]
    pub fn frame_enabled(&self) -> bool {
        self.frame_enabled
    }

    pub fn set_frame_enabled(&mut self, enabled: bool) {
        self.frame_enabled = enabled;
    }

    // =========================================================================
    // MAP LOAD
    // =========================================================================

    /// Adopt the stored fog snapshot as the reconciliation baseline.
    pub fn load_fog(&mut self, areas: Vec<RevealedArea>) {
        self.fog.replace(areas);
        self.sync.note_remote_hash(self.fog.hash());
    }

    /// Adopt a stored grid. A missing or unusable grid leaves the map in
    /// freehand mode.
    pub fn load_grid(&mut self, dto: Option<&GridConfigDto>) {
        self.grid = match dto.map(GridConfigDto::to_config) {
            Some(Ok(config)) => Some(GridIndex::new(config, self.map.size())),
            Some(Err(e)) => {
                warn!(map = %self.map.name, error = %e, "stored grid config rejected; using freehand mode");
                None
            }
            None => None,
        };
    }

    /// Restore the camera and appearance from stored settings.
    pub fn load_settings(&mut self, settings: MapSettings) {
        self.camera = settings.camera();
        self.settings = settings;
    }

    pub fn load_characters(&mut self, data: CharacterData) {
        self.characters = data;
    }

    /// Settings with the current camera written back, ready to store.
    pub fn snapshot_settings(&mut self) -> MapSettings {
        self.settings.set_camera(&self.camera);
        self.settings.clone()
    }

    // =========================================================================
    // GRID
    // =========================================================================

    #[must_use]
    pub fn grid_dto(&self) -> Option<GridConfigDto> {
        self.grid.as_ref().map(|g| GridConfigDto::from(&g.config))
    }

    /// Fit `cols x rows` square cells to the image.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] for zero counts; the previous grid is kept.
    pub fn calibrate_count(&mut self, cols: u32, rows: u32) -> Result<&GridConfig, GridError> {
        let config = GridConfig::calibrate_count(cols, rows, self.map.size())?;
        Ok(&self.install_grid(config).config)
    }

    /// Size cells so `cells` of them span from `a` to `b`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] for a zero count or coincident points; the
    /// previous grid is kept.
    pub fn calibrate_two_point(&mut self, a: Point, b: Point, cells: u32) -> Result<&GridConfig, GridError> {
        let previous = self.grid.as_ref().map(|g| g.config);
        let config = GridConfig::calibrate_two_point(a, b, cells, previous.as_ref())?;
        Ok(&self.install_grid(config).config)
    }

    /// [`GmSession::calibrate_two_point`] for two clicks in container space.
    /// `None` when the camera can't map screen points back to the image.
    pub fn calibrate_two_point_screen(
        &mut self,
        a: Point,
        b: Point,
        cells: u32,
    ) -> Option<Result<&GridConfig, GridError>> {
        let a = self.camera.screen_to_model(&self.stage, a)?;
        let b = self.camera.screen_to_model(&self.stage, b)?;
        Some(self.calibrate_two_point(a, b, cells))
    }

    /// Shift the grid; no-op without one.
    pub fn nudge_grid(&mut self, dx: f64, dy: f64) -> Option<&GridConfig> {
        let grid = self.grid.as_mut()?;
        grid.config.nudge(dx, dy);
        Some(&grid.config)
    }

    pub fn clear_grid(&mut self) {
        self.grid = None;
    }

    fn install_grid(&mut self, config: GridConfig) -> &GridIndex {
        self.grid.insert(GridIndex::new(config, self.map.size()))
    }

    // =========================================================================
    // FOG
    // =========================================================================

    /// Regions a brush at image point `p` covers: the brush block with a
    /// grid, one freehand circle without.
    #[must_use]
    pub fn regions_at(&self, p: Point) -> Vec<RevealedArea> {
        match &self.grid {
            Some(grid) => grid.brush_cells(p, self.brush).iter().map(RevealedArea::grid).collect(),
            None if self.map.contains(p.x, p.y) => vec![RevealedArea::freehand(p, DEFAULT_FREEHAND_RADIUS)],
            None => Vec::new(),
        }
    }

    /// Paint or erase at image point `p`: apply locally, then queue.
    pub fn edit_at(&mut self, p: Point, action: FogAction, now: Instant) -> EditOutcome {
        let regions = self.regions_at(p);
        let mut outcome = EditOutcome { regions: regions.len(), ..EditOutcome::default() };
        for area in regions {
            let edit = FogEdit::new(area, action);
            outcome.changed |= self.fog.apply(&edit);
            if self.sync.queue(edit, now) == QueueOutcome::FlushNow {
                outcome.flush_now = true;
            }
        }
        outcome
    }

    /// As [`GmSession::edit_at`] for a container-relative screen point.
    pub fn edit_at_screen(&mut self, screen: Point, action: FogAction, now: Instant) -> Option<EditOutcome> {
        let p = self.camera.screen_to_model(&self.stage, screen)?;
        Some(self.edit_at(p, action, now))
    }

    pub fn begin_stroke(&mut self) {
        self.sync.begin_gesture();
    }

    pub fn end_stroke(&mut self) {
        self.sync.end_gesture();
    }

    /// Clear local fog and anything still queued, and schedule the store reset.
    pub fn reset_fog(&mut self, now: Instant) {
        self.fog.reset();
        self.sync.request_reset(now);
    }

    /// Fog layer in the stored colour at the GM's translucent opacity, so the
    /// terrain under the fog stays visible to the GM.
    #[must_use]
    pub fn fog_layer(&self) -> FogLayerPlan {
        let opacity = self.settings.fog_opacity.unwrap_or(DEFAULT_GM_FOG_OPACITY);
        let color = self.settings.fog_color.as_deref().unwrap_or(DEFAULT_FOG_COLOR);
        let fill = hex_to_rgba(color, opacity).unwrap_or(Rgba { r: 0, g: 0, b: 0, a: DEFAULT_GM_FOG_OPACITY });
        plan_fog_layer(self.fog.areas(), fill)
    }

    /// Grid overlay lines, unless hidden in settings.
    #[must_use]
    pub fn grid_overlay(&self) -> Option<GridLines> {
        if self.settings.grid_visible == Some(false) {
            return None;
        }
        self.grid.as_ref().map(|g| grid_lines(&g.config, self.map.size()))
    }

    /// Hover highlight for the current tool; grid mode only.
    #[must_use]
    pub fn highlight(&self, p: Point) -> Option<BrushHighlight> {
        brush_highlight(self.grid.as_ref()?, p, self.brush, self.tool)
    }

    // =========================================================================
    // CAMERA
    // =========================================================================

    /// Apply a navigation command to the GM's own camera.
    pub fn navigate(&mut self, command: &NavigationCommand) -> NavEffect {
        command.apply(&mut self.camera, self.pan_step)
    }

    /// Current view for telemetry.
    #[must_use]
    pub fn viewport(&self) -> Option<ViewportDescriptor> {
        ViewportDescriptor::capture(&self.camera, &self.stage)
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    /// Snap an image point to its cell centre when a grid exists.
    fn snap(&self, p: Point) -> Point {
        self.grid.as_ref().and_then(|g| g.get_cell(p)).map_or(p, |c| c.center())
    }

    fn tolerance(&self) -> f64 {
        tokens::hit_tolerance(self.grid.as_ref().map(|g| g.config.cell_size()))
    }

    pub fn place_player(&mut self, p: Point) {
        let at = self.snap(p);
        tokens::add_player(&mut self.characters, at);
    }

    /// Place an enemy and return its letter.
    pub fn place_enemy(&mut self, p: Point) -> String {
        let at = self.snap(p);
        tokens::add_enemy(&mut self.characters, at)
    }

    /// Move whichever token sits at `from` to `to`.
    pub fn move_token(&mut self, from: Point, to: Point) -> bool {
        let from = self.snap(from);
        let to = self.snap(to);
        match tokens::find_at(&self.characters, from, self.tolerance()) {
            Some(hit) => tokens::move_token(&mut self.characters, hit, to),
            None => false,
        }
    }

    pub fn remove_token(&mut self, p: Point) -> bool {
        let at = self.snap(p);
        let tolerance = self.tolerance();
        tokens::remove_at(&mut self.characters, at, tolerance).is_some()
    }

    pub fn remove_last_token(&mut self, kind: TokenKind) -> bool {
        tokens::remove_last(&mut self.characters, kind)
    }

    pub fn remove_all_tokens(&mut self, kind: TokenKind) {
        tokens::remove_all(&mut self.characters, kind);
    }
}
