use crate::api::models::{Device, NowPlaying, Playlist, RefreshOutcome, TokenGrant, Track};
use crate::api::StreamingApi;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) fn track(id: &str, secs: u64) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {}", id),
        uri: format!("spotify:track:{}", id),
        duration_ms: secs * 1000,
        artist_name: "Artist".to_string(),
        album_name: "Album".to_string(),
    }
}

pub(crate) fn grant(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenGrant {
    TokenGrant {
        access_token: access.to_string(),
        refresh_token: refresh.map(|s| s.to_string()),
        expires_in,
        token_type: Some("Bearer".to_string()),
    }
}

/// In-memory stand-in for the streaming service that records every
/// playback command it receives.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub login_grant: Mutex<Option<TokenGrant>>,
    pub login_delay: Mutex<Duration>,
    pub refresh_outcomes: Mutex<VecDeque<RefreshOutcome>>,
    pub refresh_calls: Mutex<Vec<String>>,
    pub now_playing: Mutex<Option<NowPlaying>>,
    pub catalog: Mutex<HashMap<String, Track>>,
    pub playlist_items: Mutex<HashMap<String, Vec<Track>>>,
    pub played: Mutex<Vec<String>>,
    pub played_positions: Mutex<Vec<Option<u64>>>,
    pub transfers: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(self, tracks: &[Track]) -> Self {
        {
            let mut catalog = self.catalog.lock().unwrap();
            for t in tracks {
                catalog.insert(t.id.clone(), t.clone());
            }
        }
        self
    }

    pub fn with_playlist(self, id: &str, tracks: Vec<Track>) -> Self {
        self.playlist_items
            .lock()
            .unwrap()
            .insert(id.to_string(), tracks);
        self
    }

    pub fn with_login(self, grant: TokenGrant) -> Self {
        *self.login_grant.lock().unwrap() = Some(grant);
        self
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingApi for FakeApi {
    fn login_url(&self, redirect_uri: &str) -> String {
        format!("https://accounts.test/authorize?redirect_uri={}", redirect_uri)
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Option<TokenGrant> {
        let delay = *self.login_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if code == "bad" {
            return None;
        }
        self.login_grant.lock().unwrap().clone()
    }

    async fn refresh(&self, refresh_token: &str) -> RefreshOutcome {
        self.refresh_calls
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.refresh_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RefreshOutcome::Granted(grant("refreshed", None, 3600)))
    }

    async fn devices(&self, token: Option<&str>) -> Option<Vec<Device>> {
        token?;
        Some(vec![Device {
            id: Some("dev-1".to_string()),
            name: "Living room".to_string(),
            device_type: "Speaker".to_string(),
            is_active: true,
            volume_percent: Some(60),
        }])
    }

    async fn transfer_playback(&self, _token: Option<&str>, device_id: &str) -> bool {
        self.transfers.lock().unwrap().push(device_id.to_string());
        true
    }

    async fn now_playing(&self, _token: Option<&str>) -> Option<NowPlaying> {
        self.now_playing.lock().unwrap().clone()
    }

    async fn start_playback(
        &self,
        _token: Option<&str>,
        _device_id: &str,
        uris: &[String],
        position_ms: Option<u64>,
    ) -> bool {
        self.played.lock().unwrap().extend(uris.iter().cloned());
        self.played_positions.lock().unwrap().push(position_ms);
        true
    }

    async fn playlists(&self, _token: Option<&str>) -> Vec<Playlist> {
        let items = self.playlist_items.lock().unwrap();
        let mut playlists: Vec<Playlist> = items
            .iter()
            .map(|(id, tracks)| Playlist {
                id: id.clone(),
                name: format!("Playlist {}", id),
                description: None,
                owner_name: None,
                number_of_items: Some(tracks.len() as u32),
            })
            .collect();
        playlists.sort_by(|a, b| a.id.cmp(&b.id));
        playlists
    }

    async fn playlist_tracks(
        &self,
        _token: Option<&str>,
        playlist_id: &str,
        skip: u32,
    ) -> Vec<Track> {
        self.playlist_items
            .lock()
            .unwrap()
            .get(playlist_id)
            .map(|tracks| tracks.iter().skip(skip as usize).cloned().collect())
            .unwrap_or_default()
    }

    async fn search_tracks(
        &self,
        _token: Option<&str>,
        query: &str,
        page: u32,
    ) -> Option<Vec<Track>> {
        let catalog = self.catalog.lock().unwrap();
        let mut hits: Vec<Track> = catalog
            .values()
            .filter(|t| t.name.contains(query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Some(hits.into_iter().skip(page as usize * 10).take(10).collect())
    }

    async fn track(&self, _token: Option<&str>, track_id: &str) -> Option<Track> {
        self.catalog.lock().unwrap().get(track_id).cloned()
    }
}
