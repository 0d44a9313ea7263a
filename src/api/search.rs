use crate::api::client::WebApiClient;
use crate::api::models::{parse_track, Track};
use std::time::Duration;

const SEARCH_ATTEMPTS: usize = 2;
const SEARCH_RETRY_DELAY: Duration = Duration::from_secs(1);

impl WebApiClient {
    /// One page of track search results. The search endpoint fails
    /// intermittently, so an unavailable answer is retried once.
    pub async fn search_tracks(
        &self,
        token: Option<&str>,
        query: &str,
        page: u32,
    ) -> Option<Vec<Track>> {
        let limit = self.search_page_size;
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("market", self.market.clone()),
            ("limit", limit.to_string()),
            ("offset", page.saturating_mul(limit).to_string()),
        ];

        for attempt in 1..=SEARCH_ATTEMPTS {
            let response = self.get(token, "/search", &params).await;
            if let Some(items) = response
                .as_ref()
                .and_then(|body| body.get("tracks"))
                .and_then(|tracks| tracks.get("items"))
                .and_then(|v| v.as_array())
            {
                return Some(items.iter().filter_map(parse_track).collect());
            }
            if attempt < SEARCH_ATTEMPTS {
                log::info!("Search for {:?} unavailable, retrying", query);
                tokio::time::sleep(SEARCH_RETRY_DELAY).await;
            }
        }
        None
    }
}
