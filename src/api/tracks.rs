use crate::api::client::WebApiClient;
use crate::api::models::{parse_track, Track};

impl WebApiClient {
    pub async fn get_track(&self, token: Option<&str>, track_id: &str) -> Option<Track> {
        let path = format!("/tracks/{}", urlencoding::encode(track_id));
        let query = [("market", self.market.clone())];
        let body = self.get(token, &path, &query).await?;
        let track = parse_track(&body);
        if track.is_none() {
            log::warn!("Track {} has no playable uri", track_id);
        }
        track
    }
}
