//! `reqwest` implementation of every store capability.
//!
//! URLs are built from the shared route table by appending percent-encoded
//! path segments to the configured API root, so a map name is always exactly
//! one segment no matter what characters it contains.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::time::Duration;

use mapview::fog::{RevealedArea, hash_areas};
use mapview::nav::NavigationCommand;
use mapview::viewport::ViewportDescriptor;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use wire::routes;
use wire::{
    CharacterData, FogHash, FogSnapshot, GridConfigDto, MapSettings, NavEnvelope, PreviewStatus, RefreshFlag,
    ViewportFrameToggle,
};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::store::{FogStore, MapConfigStore, NavigationChannel, ViewportTelemetry};

#[derive(Clone, Debug)]
pub struct HttpBackend {
    http: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidBaseUrl`] when `base_url` cannot carry
    /// path segments, or [`SessionError::Http`] if the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SessionError> {
        let base = Url::parse(base_url).map_err(|e| SessionError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SessionError::InvalidBaseUrl(base_url.to_owned()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    /// # Errors
    ///
    /// As [`HttpBackend::new`].
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        Self::new(&config.base_url, config.request_timeout)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a route pattern against the API root.
    pub(crate) fn url(&self, pattern: &str, map: &str) -> Result<Url, SessionError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| SessionError::InvalidBaseUrl(self.base.to_string()))?;
            segments.pop_if_empty().extend(routes::segments(pattern, map));
        }
        Ok(url)
    }

    /// Liveness probe against the server root, outside the API prefix.
    ///
    /// # Errors
    ///
    /// Returns the transport error or the unexpected status.
    pub async fn healthz(&self) -> Result<(), SessionError> {
        let url = self
            .base
            .join(routes::HEALTHZ)
            .map_err(|e| SessionError::InvalidBaseUrl(e.to_string()))?;
        let response = self.http.get(url).send().await?;
        checked_text(response).await.map(drop)
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, SessionError> {
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = checked_text(response).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<(), SessionError> {
        let response = self.http.post(url).json(body).send().await?;
        checked_text(response).await.map(drop)
    }

    async fn delete(&self, url: Url) -> Result<(), SessionError> {
        let response = self.http.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        checked_text(response).await.map(drop)
    }
}

async fn checked_text(response: reqwest::Response) -> Result<String, SessionError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(SessionError::Status { status: status.as_u16(), body: text });
    }
    Ok(text)
}

// =============================================================================
// FOG
// =============================================================================

#[async_trait::async_trait]
impl FogStore for HttpBackend {
    async fn load_fog(&self, map: &str) -> Result<Vec<RevealedArea>, SessionError> {
        let snapshot: Option<FogSnapshot> = self.get_optional(self.url(routes::FOG, map)?).await?;
        Ok(snapshot.map(|s| s.revealed_areas).unwrap_or_default())
    }

    async fn fog_hash(&self, map: &str) -> Result<String, SessionError> {
        let hash: Option<FogHash> = self.get_optional(self.url(routes::FOG_HASH, map)?).await?;
        Ok(hash.map_or_else(|| hash_areas(&[]), |h| h.hash))
    }

    async fn reveal_batch(&self, map: &str, areas: &[RevealedArea]) -> Result<(), SessionError> {
        self.post_json(self.url(routes::FOG_REVEAL_BATCH, map)?, areas).await
    }

    async fn hide_batch(&self, map: &str, areas: &[RevealedArea]) -> Result<(), SessionError> {
        self.post_json(self.url(routes::FOG_HIDE_BATCH, map)?, areas).await
    }

    async fn reset_fog(&self, map: &str) -> Result<(), SessionError> {
        let response = self.http.post(self.url(routes::FOG_RESET, map)?).send().await?;
        checked_text(response).await.map(drop)
    }
}

// =============================================================================
// MAP CONFIG
// =============================================================================

#[async_trait::async_trait]
impl MapConfigStore for HttpBackend {
    async fn load_grid(&self, map: &str) -> Result<Option<GridConfigDto>, SessionError> {
        self.get_optional(self.url(routes::GRID_CONFIG, map)?).await
    }

    async fn save_grid(&self, map: &str, grid: &GridConfigDto) -> Result<(), SessionError> {
        self.post_json(self.url(routes::GRID_CONFIG, map)?, grid).await
    }

    async fn clear_grid(&self, map: &str) -> Result<(), SessionError> {
        self.delete(self.url(routes::GRID_CONFIG, map)?).await
    }

    async fn load_settings(&self, map: &str) -> Result<Option<MapSettings>, SessionError> {
        self.get_optional(self.url(routes::SETTINGS, map)?).await
    }

    async fn save_settings(&self, map: &str, settings: &MapSettings) -> Result<(), SessionError> {
        self.post_json(self.url(routes::SETTINGS, map)?, settings).await
    }

    async fn load_characters(&self, map: &str) -> Result<Option<CharacterData>, SessionError> {
        self.get_optional(self.url(routes::CHARACTERS, map)?).await
    }

    async fn save_characters(&self, map: &str, data: &CharacterData) -> Result<(), SessionError> {
        self.post_json(self.url(routes::CHARACTERS, map)?, data).await
    }
}

// =============================================================================
// PREVIEW
// =============================================================================

#[async_trait::async_trait]
impl NavigationChannel for HttpBackend {
    async fn enqueue(&self, command: &NavigationCommand) -> Result<(), SessionError> {
        let envelope = wire::encode_command(command);
        self.post_json(self.url(routes::PREVIEW_NAVIGATION, "")?, &envelope).await
    }

    async fn dequeue(&self) -> Result<Option<NavigationCommand>, SessionError> {
        let envelope: Option<NavEnvelope> = self.get_optional(self.url(routes::PREVIEW_NAVIGATION, "")?).await?;
        match envelope {
            Some(env) => Ok(wire::decode_command(&env)?),
            None => Ok(None),
        }
    }

    async fn preview_map(&self) -> Result<Option<String>, SessionError> {
        let response = self.http.get(self.url(routes::PREVIEW_MAP, "")?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let name = checked_text(response).await?;
        let name = name.trim();
        Ok((!name.is_empty()).then(|| name.to_owned()))
    }

    async fn set_preview_map(&self, map: &str) -> Result<(), SessionError> {
        let response = self
            .http
            .post(self.url(routes::PREVIEW_MAP, "")?)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(map.to_owned())
            .send()
            .await?;
        checked_text(response).await.map(drop)
    }

    async fn take_refresh(&self) -> Result<bool, SessionError> {
        let flag: Option<RefreshFlag> = self.get_optional(self.url(routes::PREVIEW_REFRESH, "")?).await?;
        Ok(flag.is_some_and(|f| f.refresh))
    }

    async fn status(&self) -> Result<PreviewStatus, SessionError> {
        let status: Option<PreviewStatus> = self.get_optional(self.url(routes::PREVIEW_STATUS, "")?).await?;
        Ok(status.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ViewportTelemetry for HttpBackend {
    async fn report(&self, viewport: &ViewportDescriptor) -> Result<(), SessionError> {
        self.post_json(self.url(routes::PREVIEW_VIEWPORT, "")?, viewport).await
    }

    async fn latest(&self) -> Result<Option<ViewportDescriptor>, SessionError> {
        self.get_optional(self.url(routes::PREVIEW_VIEWPORT, "")?).await
    }

    async fn set_frame_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        self.post_json(self.url(routes::PREVIEW_VIEWPORT_FRAME, "")?, &ViewportFrameToggle { enabled })
            .await
    }

    async fn frame_enabled(&self) -> Result<bool, SessionError> {
        Ok(NavigationChannel::status(self).await?.viewport_frame_enabled)
    }
}
