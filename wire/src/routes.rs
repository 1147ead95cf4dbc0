//! Route table shared by the server router and the HTTP client.
//!
//! Patterns use Axum's `{map}` capture syntax and are relative to the API
//! prefix. Clients turn a pattern into path segments with [`segments`] so map
//! names are percent-encoded by the URL builder rather than spliced in raw.

pub const API_PREFIX: &str = "/api";

pub const HEALTHZ: &str = "/healthz";

pub const FOG: &str = "/fog/{map}";
pub const FOG_REVEAL_BATCH: &str = "/fog/{map}/reveal-batch";
pub const FOG_HIDE_BATCH: &str = "/fog/{map}/hide-batch";
pub const FOG_RESET: &str = "/fog/{map}/reset";
pub const FOG_HASH: &str = "/fog-states/{map}/hash";

pub const GRID_CONFIG: &str = "/grid-configs/{map}";
pub const SETTINGS: &str = "/settings/{map}";
pub const CHARACTERS: &str = "/characters/{map}";

pub const PREVIEW_MAP: &str = "/preview-map";
pub const PREVIEW_REFRESH: &str = "/preview-map/refresh";
pub const PREVIEW_NAVIGATION: &str = "/preview-map/navigation";
pub const PREVIEW_VIEWPORT: &str = "/preview-map/viewport";
pub const PREVIEW_VIEWPORT_FRAME: &str = "/preview-map/viewport-frame";
pub const PREVIEW_STATUS: &str = "/preview-map/status";

/// Split `pattern` into path segments, substituting `map` for `{map}`.
#[must_use]
pub fn segments<'a>(pattern: &'a str, map: &'a str) -> Vec<&'a str> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| if s == "{map}" { map } else { s })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_substitute_map_name() {
        assert_eq!(segments(FOG_REVEAL_BATCH, "cave.png"), vec!["fog", "cave.png", "reveal-batch"]);
        assert_eq!(segments(FOG_HASH, "m"), vec!["fog-states", "m", "hash"]);
    }

    #[test]
    fn segments_without_capture_ignore_map() {
        assert_eq!(segments(PREVIEW_STATUS, "unused"), vec!["preview-map", "status"]);
    }

    #[test]
    fn map_name_with_slash_stays_one_segment() {
        assert_eq!(segments(FOG, "a/b"), vec!["fog", "a/b"]);
    }
}
