use crate::api::client::WebApiClient;
use crate::api::models::{parse_playlist, parse_track, Playlist, Track};

impl WebApiClient {
    pub async fn get_playlists(&self, token: Option<&str>) -> Vec<Playlist> {
        let items = self
            .paginate(token, "/me/playlists", &[("limit", "50".to_string())], 0)
            .await;
        items.iter().filter_map(parse_playlist).collect()
    }

    /// Every playable track of a playlist, starting `skip` items in.
    pub async fn get_playlist_tracks(
        &self,
        token: Option<&str>,
        playlist_id: &str,
        skip: u32,
    ) -> Vec<Track> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let query = [
            ("limit", "100".to_string()),
            ("market", self.market.clone()),
        ];
        let items = self.paginate(token, &path, &query, skip).await;

        let tracks: Vec<Track> = items
            .iter()
            .filter_map(|item| item.get("track"))
            .filter_map(parse_track)
            .collect();
        if tracks.len() < items.len() {
            log::info!(
                "Playlist {}: skipped {} unplayable items",
                playlist_id,
                items.len() - tracks.len()
            );
        }
        tracks
    }
}
