#![allow(clippy::float_cmp)]

use super::*;
use std::time::Duration;

fn session() -> GmSession {
    let map = MapDescriptor::new("cave.png", 800.0, 600.0).unwrap();
    GmSession::new(map, Size::new(800.0, 600.0), &SessionConfig::default())
}

fn gridded() -> GmSession {
    let mut gm = session();
    gm.load_grid(Some(&GridConfigDto {
        grid_size: 100.0,
        offset_x: 0.0,
        offset_y: 0.0,
        line_width: None,
        calibrated: true,
    }));
    gm
}

// =============================================================================
// Fog edits
// =============================================================================

#[test]
fn erase_with_brush_three_reveals_nine_cells() {
    let mut gm = gridded();
    let before = gm.fog().hash().to_owned();
    let now = Instant::now();

    let outcome = gm.edit_at(Point::new(150.0, 250.0), FogAction::Reveal, now);
    assert_eq!(outcome, EditOutcome { regions: 9, changed: true, flush_now: false });

    let mut centres: Vec<(f64, f64)> = gm.fog().areas().iter().map(|a| (a.x, a.y)).collect();
    centres.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.total_cmp(&b.0)));
    assert_eq!(
        centres,
        vec![
            (50.0, 150.0),
            (150.0, 150.0),
            (250.0, 150.0),
            (50.0, 250.0),
            (150.0, 250.0),
            (250.0, 250.0),
            (50.0, 350.0),
            (150.0, 350.0),
            (250.0, 350.0),
        ]
    );
    assert!(gm.fog().areas().iter().all(|a| a.radius == 50.0 && a.is_grid_cell));
    assert_ne!(gm.fog().hash(), before);

    assert_eq!(gm.sync().pending().len(), 9);
    assert_eq!(gm.sync().deadline(), Some(now + Duration::from_millis(400)));
}

#[test]
fn repeated_erase_is_idempotent() {
    let mut gm = gridded();
    let now = Instant::now();
    gm.edit_at(Point::new(150.0, 250.0), FogAction::Reveal, now);
    let hash = gm.fog().hash().to_owned();
    let outcome = gm.edit_at(Point::new(150.0, 250.0), FogAction::Reveal, now);
    assert!(!outcome.changed);
    assert_eq!(gm.fog().hash(), hash);
    assert_eq!(gm.sync().pending().len(), 9, "duplicates are not queued twice");
}

#[test]
fn paint_after_erase_hides_and_queues_both() {
    let mut gm = gridded();
    gm.set_brush(1);
    let now = Instant::now();
    gm.edit_at(Point::new(150.0, 250.0), FogAction::Reveal, now);
    let outcome = gm.edit_at(Point::new(150.0, 250.0), FogAction::Hide, now);
    assert!(outcome.changed);
    assert!(gm.fog().is_empty());
    assert_eq!(gm.sync().pending().len(), 2);
}

#[test]
fn freehand_without_grid() {
    let mut gm = session();
    let outcome = gm.edit_at(Point::new(400.0, 300.0), FogAction::Reveal, Instant::now());
    assert_eq!(outcome.regions, 1);
    let area = gm.fog().areas()[0];
    assert!(!area.is_grid_cell);
    assert_eq!(area.radius, 20.0);
}

#[test]
fn freehand_outside_map_does_nothing() {
    let mut gm = session();
    let outcome = gm.edit_at(Point::new(900.0, 300.0), FogAction::Reveal, Instant::now());
    assert_eq!(outcome, EditOutcome::default());
    assert!(gm.sync().pending().is_empty());
}

#[test]
fn screen_edit_goes_through_camera() {
    let mut gm = gridded();
    gm.set_brush(1);
    // Identity camera over an equally sized container: screen == image.
    let outcome = gm.edit_at_screen(Point::new(150.0, 250.0), FogAction::Reveal, Instant::now()).unwrap();
    assert_eq!(outcome.regions, 1);
    assert_eq!((gm.fog().areas()[0].x, gm.fog().areas()[0].y), (150.0, 250.0));
}

#[test]
fn large_stroke_requests_immediate_flush() {
    let mut gm = gridded();
    gm.set_brush(1);
    let now = Instant::now();
    let mut flush = false;
    for row in 0..6 {
        for col in 0..5 {
            let p = Point::new(f64::from(col) * 100.0 + 50.0, f64::from(row) * 100.0 + 50.0);
            flush |= gm.edit_at(p, FogAction::Reveal, now).flush_now;
        }
    }
    assert!(flush);
}

#[test]
fn reset_clears_fog_and_queue() {
    let mut gm = gridded();
    let now = Instant::now();
    gm.edit_at(Point::new(150.0, 250.0), FogAction::Reveal, now);
    gm.reset_fog(now);
    assert!(gm.fog().is_empty());
    assert!(gm.sync().pending().is_empty());
    assert!(gm.sync().reset_requested());
}

#[test]
fn load_fog_sets_reconciliation_baseline() {
    let mut gm = session();
    gm.load_fog(vec![RevealedArea { x: 50.0, y: 50.0, radius: 50.0, is_grid_cell: true }]);
    assert_eq!(gm.sync().known_hash(), Some(gm.fog().hash()));
}

// =============================================================================
// Grid
// =============================================================================

#[test]
fn invalid_stored_grid_falls_back_to_freehand() {
    let mut gm = session();
    gm.load_grid(Some(&GridConfigDto {
        grid_size: -4.0,
        offset_x: 0.0,
        offset_y: 0.0,
        line_width: None,
        calibrated: true,
    }));
    assert!(gm.grid().is_none());
}

#[test]
fn failed_calibration_keeps_previous_grid() {
    let mut gm = gridded();
    assert!(gm.calibrate_count(0, 4).is_err());
    assert_eq!(gm.grid().unwrap().config.cell_size(), 100.0);
}

#[test]
fn count_calibration_installs_grid() {
    let mut gm = session();
    let cell = gm.calibrate_count(8, 6).unwrap().cell_size();
    assert_eq!(cell, 100.0);
    assert_eq!(gm.grid_dto().unwrap().grid_size, 100.0);
}

#[test]
fn two_point_calibration_keeps_offsets() {
    let mut gm = gridded();
    gm.nudge_grid(10.0, 20.0);
    let config = *gm.calibrate_two_point(Point::new(0.0, 0.0), Point::new(250.0, 0.0), 5).unwrap();
    assert_eq!(config.cell_size(), 50.0);
    assert_eq!((config.offset_x(), config.offset_y()), (10.0, 20.0));
}

#[test]
fn screen_calibration_undoes_zoom() {
    let mut gm = session();
    gm.navigate(&NavigationCommand::Zoom(mapview::nav::ZoomCommand::Set { zoom: 2.0 }));
    // 500 screen px at zoom 2 span 250 image px.
    let config = *gm.calibrate_two_point_screen(Point::new(100.0, 300.0), Point::new(600.0, 300.0), 5).unwrap().unwrap();
    assert_eq!(config.cell_size(), 50.0);
    assert_eq!(gm.grid().unwrap().config.cell_size(), 50.0);
}

#[test]
fn screen_calibration_rejects_coincident_clicks() {
    let mut gm = session();
    let result = gm.calibrate_two_point_screen(Point::new(10.0, 10.0), Point::new(10.0, 10.0), 4).unwrap();
    assert!(result.is_err());
    assert!(gm.grid().is_none());
}

#[test]
fn highlight_only_with_grid() {
    let gm = session();
    assert!(gm.highlight(Point::new(100.0, 100.0)).is_none());
    let gm = gridded();
    assert_eq!(gm.highlight(Point::new(150.0, 250.0)).unwrap().cells.len(), 9);
}

// =============================================================================
// Camera and settings
// =============================================================================

#[test]
fn settings_restore_camera_and_round_trip() {
    let mut gm = session();
    let settings: MapSettings =
        serde_json::from_value(serde_json::json!({"zoom": 2.0, "rotation": 90, "fogColor": "#222222"})).unwrap();
    gm.load_settings(settings);
    assert_eq!(gm.camera().zoom, 2.0);
    assert_eq!(gm.camera().rotation_deg, 90.0);

    gm.navigate(&NavigationCommand::Pan { direction: mapview::nav::Direction::Up });
    let saved = gm.snapshot_settings();
    assert_eq!(saved.zoom, Some(2.0));
    assert_eq!(saved.rotation, Some(90.0));
    assert!(saved.pan_offset.is_some());
    assert_eq!(saved.fog_color.as_deref(), Some("#222222"));
}

#[test]
fn viewport_covers_whole_map_at_identity() {
    let gm = session();
    let vp = gm.viewport().unwrap();
    assert_eq!((vp.x, vp.y, vp.width, vp.height), (0.0, 0.0, 800.0, 600.0));
}

// =============================================================================
// Tokens
// =============================================================================

#[test]
fn tokens_snap_to_cell_centres() {
    let mut gm = gridded();
    gm.place_player(Point::new(110.0, 120.0));
    assert_eq!(gm.place_enemy(Point::new(310.0, 320.0)), "A");
    let player = gm.characters().characters.players[0];
    assert_eq!((player.x, player.y), (150.0, 150.0));

    assert!(gm.move_token(Point::new(140.0, 160.0), Point::new(420.0, 420.0)));
    let player = gm.characters().characters.players[0];
    assert_eq!((player.x, player.y), (450.0, 450.0));

    assert!(gm.remove_token(Point::new(350.0, 350.0)));
    assert!(gm.characters().characters.enemies.is_empty());
}

// =============================================================================
// Rendering
// =============================================================================

#[test]
fn gm_fog_is_translucent_by_default() {
    let mut gm = gridded();
    gm.edit_at(Point::new(150.0, 250.0), FogAction::Reveal, Instant::now());
    let layer = gm.fog_layer();
    assert_eq!(layer.fill.a, 0.7);
    assert_eq!(layer.ops.len(), 9);
}

#[test]
fn grid_overlay_respects_visibility_setting() {
    let mut gm = gridded();
    assert_eq!(gm.grid_overlay().unwrap().vertical.len(), 9);
    gm.load_settings(MapSettings { grid_visible: Some(false), ..MapSettings::default() });
    assert!(gm.grid_overlay().is_none());
}
