use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub duration_ms: u64,
    pub artist_name: String,
    pub album_name: String,
}

impl Track {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    pub device_type: String,
    pub is_active: bool,
    pub volume_percent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_name: Option<String>,
    pub number_of_items: Option<u32>,
}

/// Snapshot of what the remote player reports right now.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub is_playing: bool,
    pub progress_ms: u64,
    pub item: Option<Track>,
}

impl NowPlaying {
    /// Time left on the active track, if something is actually playing.
    pub fn remaining(&self) -> Option<Duration> {
        if !self.is_playing {
            return None;
        }
        self.item
            .as_ref()
            .map(|track| Duration::from_millis(track.duration_ms.saturating_sub(self.progress_ms)))
    }
}

// Auth types
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Result of a refresh-token exchange.
///
/// `Unavailable` means the token endpoint could not be reached or answered
/// with something other than a verdict; `Rejected` means it explicitly
/// refused the refresh token.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Granted(TokenGrant),
    Rejected,
    Unavailable,
}

/// One page of an offset-paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub next: Option<String>,
}

impl Page {
    /// Offset of the following page, or `None` when the listing is exhausted.
    pub fn next_offset(&self, offset: u32) -> Option<u32> {
        if self.next.is_none() || self.limit == 0 {
            return None;
        }
        Some(offset + self.limit)
    }
}

fn joined_names(value: Option<&serde_json::Value>) -> String {
    value
        .and_then(|v| v.as_array())
        .map(|artists| {
            artists
                .iter()
                .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|names| !names.is_empty())
        .unwrap_or_else(|| "Unknown Artist".to_string())
}

/// Parse a track object. Local files and unavailable items come back
/// without an id or uri and are skipped.
pub fn parse_track(value: &serde_json::Value) -> Option<Track> {
    let id = value.get("id").and_then(|v| v.as_str())?;
    let uri = value.get("uri").and_then(|v| v.as_str())?;
    if id.is_empty() || uri.is_empty() {
        return None;
    }
    let name = value
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let duration_ms = value
        .get("duration_ms")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let album_name = value
        .get("album")
        .and_then(|a| a.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(Track {
        id: id.to_string(),
        name,
        uri: uri.to_string(),
        duration_ms,
        artist_name: joined_names(value.get("artists")),
        album_name,
    })
}

pub fn parse_device(value: &serde_json::Value) -> Option<Device> {
    let name = value.get("name").and_then(|v| v.as_str())?;
    Some(Device {
        id: value
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        name: name.to_string(),
        device_type: value
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        is_active: value
            .get("is_active")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        volume_percent: value
            .get("volume_percent")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32),
    })
}

pub fn parse_playlist(value: &serde_json::Value) -> Option<Playlist> {
    let id = value.get("id").and_then(|v| v.as_str())?;
    let name = value.get("name").and_then(|v| v.as_str()).unwrap_or("");
    Some(Playlist {
        id: id.to_string(),
        name: name.to_string(),
        description: value
            .get("description")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        owner_name: value
            .get("owner")
            .and_then(|o| o.get("display_name"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        number_of_items: value
            .get("tracks")
            .and_then(|t| t.get("total"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32),
    })
}

/// Parse the player state. A `null` body (204 No Content) means nothing is
/// loaded on any device.
pub fn parse_now_playing(value: &serde_json::Value) -> Option<NowPlaying> {
    if value.is_null() {
        return None;
    }
    Some(NowPlaying {
        is_playing: value
            .get("is_playing")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        progress_ms: value
            .get("progress_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        item: value.get("item").and_then(parse_track),
    })
}
