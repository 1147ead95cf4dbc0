use super::*;
use crate::state::test_helpers;
use mapview::fog::RevealedArea;

fn cell(x: f64, y: f64) -> RevealedArea {
    RevealedArea { x, y, radius: 25.0, is_grid_cell: true }
}

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__TEST_FOGMAP_NONEXISTENT__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__TEST_FOGMAP_EP_VALID__", " 250 ") };
    let val: u64 = env_parse("__TEST_FOGMAP_EP_VALID__", 0);
    assert_eq!(val, 250);
    unsafe { std::env::remove_var("__TEST_FOGMAP_EP_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__TEST_FOGMAP_EP_INVALID__", "soon") };
    let val: u64 = env_parse("__TEST_FOGMAP_EP_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__TEST_FOGMAP_EP_INVALID__") };
}

// =============================================================================
// PATHS
// =============================================================================

#[test]
fn file_stem_keeps_plain_names_readable() {
    let stem = file_stem("cave level-2.png");
    assert!(stem.starts_with("cave level-2.png-"));
    assert_eq!(stem.len(), "cave level-2.png-".len() + 16);
    assert_eq!(stem, file_stem("cave level-2.png"));
}

#[test]
fn file_stem_neutralises_separators() {
    assert!(file_stem("../etc/passwd").starts_with(".._etc_passwd-"));
    assert!(!file_stem("a\\b").contains('\\'));
    assert_ne!(file_stem(".."), "..");
}

#[test]
fn names_that_sanitise_alike_get_distinct_stems() {
    let stems = [file_stem("a/b"), file_stem("a?b"), file_stem("a_b")];
    assert!(stems.iter().all(|s| s.starts_with("a_b-")));
    assert_ne!(stems[0], stems[1]);
    assert_ne!(stems[1], stems[2]);
    assert_ne!(stems[0], stems[2]);
}

#[test]
fn section_path_uses_suffix() {
    let path = section_path(Path::new("/data"), "cave.png", Section::Grid);
    assert_eq!(path.parent(), Some(Path::new("/data")));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert_eq!(name, format!("{}_grid.json", file_stem("cave.png")));
}

// =============================================================================
// HYDRATION
// =============================================================================

#[tokio::test]
async fn missing_files_hydrate_as_empty_record() {
    let state = test_helpers::test_app_state();
    ensure_loaded(&state, "cave.png").await;
    let maps = state.maps.read().await;
    let record = maps.get("cave.png").unwrap();
    assert!(record.fog.is_empty());
    assert!(record.grid.is_none());
    assert!(record.characters.is_none());
    assert!(record.dirty.is_empty());
}

#[tokio::test]
async fn malformed_section_is_treated_as_absent() {
    let state = test_helpers::test_app_state();
    std::fs::write(section_path(&state.data_dir, "cave.png", Section::Fog), b"{not json").unwrap();
    std::fs::write(
        section_path(&state.data_dir, "cave.png", Section::Grid),
        br#"{"gridSize":40.0,"offsetX":3.0,"offsetY":4.0}"#,
    )
    .unwrap();

    ensure_loaded(&state, "cave.png").await;
    let maps = state.maps.read().await;
    let record = maps.get("cave.png").unwrap();
    assert!(record.fog.is_empty());
    assert_eq!(record.grid.as_ref().map(|g| g.grid_size), Some(40.0));
}

#[tokio::test]
async fn read_hydration_skips_maps_with_nothing_stored() {
    let state = test_helpers::test_app_state();
    load_existing(&state, "nowhere.png").await;
    assert!(state.maps.read().await.is_empty());

    std::fs::write(section_path(&state.data_dir, "cave.png", Section::Grid), br#"{"gridSize":40.0}"#).unwrap();
    load_existing(&state, "cave.png").await;
    let maps = state.maps.read().await;
    assert_eq!(maps.len(), 1);
    assert_eq!(maps.get("cave.png").unwrap().grid.as_ref().map(|g| g.grid_size), Some(40.0));
}

#[tokio::test]
async fn hydration_does_not_clobber_live_record() {
    let state = test_helpers::test_app_state();
    let mut live = MapRecord::new();
    live.fog.reveal(cell(10.0, 10.0));
    test_helpers::seed_map(&state, "cave.png", live).await;

    ensure_loaded(&state, "cave.png").await;
    assert_eq!(state.maps.read().await.get("cave.png").unwrap().fog.len(), 1);
}

// =============================================================================
// FLUSH
// =============================================================================

#[tokio::test]
async fn flush_writes_dirty_sections_and_clears_flags() {
    let state = test_helpers::test_app_state();
    let mut record = MapRecord::new();
    record.fog.reveal(cell(10.0, 10.0));
    record.touch(Section::Fog);
    test_helpers::seed_map(&state, "cave.png", record).await;

    flush_all_dirty(&state).await;

    assert!(state.maps.read().await.get("cave.png").unwrap().dirty.is_empty());
    let bytes = std::fs::read(section_path(&state.data_dir, "cave.png", Section::Fog)).unwrap();
    let snapshot: FogSnapshot = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot.revealed_areas, vec![cell(10.0, 10.0)]);
    assert!(!section_path(&state.data_dir, "cave.png", Section::Grid).exists());
}

#[tokio::test]
async fn flushed_record_round_trips_through_hydration() {
    let state = test_helpers::test_app_state();
    let mut record = MapRecord::new();
    record.fog.reveal(cell(10.0, 10.0));
    record.fog.reveal(cell(60.0, 10.0));
    record.settings = Some(MapSettings { zoom: Some(1.5), ..MapSettings::default() });
    record.touch(Section::Fog);
    record.touch(Section::Settings);
    let hash = record.fog.hash().to_owned();
    test_helpers::seed_map(&state, "cave.png", record).await;
    flush_all_dirty(&state).await;

    let fresh = AppState::new(state.data_dir.as_ref().clone());
    ensure_loaded(&fresh, "cave.png").await;
    let maps = fresh.maps.read().await;
    let loaded = maps.get("cave.png").unwrap();
    assert_eq!(loaded.fog.hash(), hash);
    assert_eq!(loaded.settings.as_ref().and_then(|s| s.zoom), Some(1.5));
}

#[tokio::test]
async fn cleared_section_removes_its_file() {
    let state = test_helpers::test_app_state();
    let path = section_path(&state.data_dir, "cave.png", Section::Grid);
    std::fs::write(&path, br#"{"gridSize":40.0}"#).unwrap();

    ensure_loaded(&state, "cave.png").await;
    {
        let mut maps = state.maps.write().await;
        let record = maps.get_mut("cave.png").unwrap();
        record.grid = None;
        record.touch(Section::Grid);
    }
    flush_all_dirty(&state).await;
    assert!(!path.exists());
}

#[tokio::test]
async fn failed_write_keeps_dirty_flags() {
    let dir = test_helpers::temp_data_dir();
    // A regular file where the data directory should be makes every write fail.
    let blocked = dir.join("not-a-dir");
    std::fs::write(&blocked, b"").unwrap();
    let state = AppState::new(blocked);

    let mut record = MapRecord::new();
    record.touch(Section::Fog);
    test_helpers::seed_map(&state, "cave.png", record).await;

    flush_all_dirty(&state).await;
    assert!(state.maps.read().await.get("cave.png").unwrap().dirty.contains(&Section::Fog));
}

#[tokio::test]
async fn dirty_flags_survive_concurrent_change() {
    let state = test_helpers::test_app_state();
    let mut record = MapRecord::new();
    record.touch(Section::Fog);
    test_helpers::seed_map(&state, "cave.png", record).await;

    let batch = {
        let maps = state.maps.read().await;
        let record = maps.get("cave.png").unwrap();
        DirtyFlushBatch {
            map: "cave.png".into(),
            revision: record.revision,
            writes: snapshot_dirty(record).unwrap(),
        }
    };
    state.maps.write().await.get_mut("cave.png").unwrap().touch(Section::Fog);

    clear_flushed(&state, &batch).await;
    assert!(state.maps.read().await.get("cave.png").unwrap().dirty.contains(&Section::Fog));
}

#[tokio::test]
async fn colliding_names_keep_separate_files() {
    let state = test_helpers::test_app_state();
    for (map, x) in [("a/b", 10.0), ("a?b", 60.0), ("a_b", 110.0)] {
        let mut record = MapRecord::new();
        record.fog.reveal(cell(x, 10.0));
        record.touch(Section::Fog);
        test_helpers::seed_map(&state, map, record).await;
    }
    flush_all_dirty(&state).await;

    let fresh = AppState::new(state.data_dir.as_ref().clone());
    for (map, x) in [("a/b", 10.0), ("a?b", 60.0), ("a_b", 110.0)] {
        load_existing(&fresh, map).await;
        let maps = fresh.maps.read().await;
        assert_eq!(maps.get(map).unwrap().fog.areas(), &[cell(x, 10.0)], "{map}");
    }
}
