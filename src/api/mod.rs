pub mod auth;
pub mod client;
pub mod models;

mod player;
mod playlists;
mod search;
mod tracks;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use client::WebApiClient;
use models::{Device, NowPlaying, Playlist, RefreshOutcome, TokenGrant, Track};

/// Everything the engine needs from the streaming service.
///
/// Implementations never fail: an unreachable or misbehaving service shows
/// up as `None`, `false` or an empty list.
#[async_trait]
pub trait StreamingApi: Send + Sync + 'static {
    fn login_url(&self, redirect_uri: &str) -> String;

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Option<TokenGrant>;

    async fn refresh(&self, refresh_token: &str) -> RefreshOutcome;

    async fn devices(&self, token: Option<&str>) -> Option<Vec<Device>>;

    async fn transfer_playback(&self, token: Option<&str>, device_id: &str) -> bool;

    async fn now_playing(&self, token: Option<&str>) -> Option<NowPlaying>;

    async fn start_playback(
        &self,
        token: Option<&str>,
        device_id: &str,
        uris: &[String],
        position_ms: Option<u64>,
    ) -> bool;

    async fn playlists(&self, token: Option<&str>) -> Vec<Playlist>;

    async fn playlist_tracks(&self, token: Option<&str>, playlist_id: &str, skip: u32)
        -> Vec<Track>;

    async fn search_tracks(&self, token: Option<&str>, query: &str, page: u32)
        -> Option<Vec<Track>>;

    async fn track(&self, token: Option<&str>, track_id: &str) -> Option<Track>;
}

#[async_trait]
impl StreamingApi for WebApiClient {
    fn login_url(&self, redirect_uri: &str) -> String {
        auth::build_login_url(&self.accounts_base_url, &self.client_id, redirect_uri)
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Option<TokenGrant> {
        self.login(code, redirect_uri).await
    }

    async fn refresh(&self, refresh_token: &str) -> RefreshOutcome {
        WebApiClient::refresh(self, refresh_token).await
    }

    async fn devices(&self, token: Option<&str>) -> Option<Vec<Device>> {
        self.get_devices(token).await
    }

    async fn transfer_playback(&self, token: Option<&str>, device_id: &str) -> bool {
        WebApiClient::transfer_playback(self, token, device_id).await
    }

    async fn now_playing(&self, token: Option<&str>) -> Option<NowPlaying> {
        self.get_now_playing(token).await
    }

    async fn start_playback(
        &self,
        token: Option<&str>,
        device_id: &str,
        uris: &[String],
        position_ms: Option<u64>,
    ) -> bool {
        WebApiClient::start_playback(self, token, device_id, uris, position_ms).await
    }

    async fn playlists(&self, token: Option<&str>) -> Vec<Playlist> {
        self.get_playlists(token).await
    }

    async fn playlist_tracks(
        &self,
        token: Option<&str>,
        playlist_id: &str,
        skip: u32,
    ) -> Vec<Track> {
        self.get_playlist_tracks(token, playlist_id, skip).await
    }

    async fn search_tracks(
        &self,
        token: Option<&str>,
        query: &str,
        page: u32,
    ) -> Option<Vec<Track>> {
        WebApiClient::search_tracks(self, token, query, page).await
    }

    async fn track(&self, token: Option<&str>, track_id: &str) -> Option<Track> {
        self.get_track(token, track_id).await
    }
}
