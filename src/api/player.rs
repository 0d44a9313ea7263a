use crate::api::client::WebApiClient;
use crate::api::models::{parse_device, parse_now_playing, Device, NowPlaying};
use serde_json::json;

impl WebApiClient {
    pub async fn get_devices(&self, token: Option<&str>) -> Option<Vec<Device>> {
        let body = self.get(token, "/me/player/devices", &[]).await?;
        let devices = body
            .get("devices")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(parse_device).collect())
            .unwrap_or_default();
        Some(devices)
    }

    pub async fn transfer_playback(&self, token: Option<&str>, device_id: &str) -> bool {
        let body = json!({ "device_ids": [device_id] });
        self.put(token, "/me/player", &[], &body).await
    }

    /// `None` both when nothing is loaded and when the service could not
    /// be asked; either way there is no track to wait for.
    pub async fn get_now_playing(&self, token: Option<&str>) -> Option<NowPlaying> {
        let body = self.get(token, "/me/player", &[]).await?;
        parse_now_playing(&body)
    }

    pub async fn start_playback(
        &self,
        token: Option<&str>,
        device_id: &str,
        uris: &[String],
        position_ms: Option<u64>,
    ) -> bool {
        let mut body = json!({ "uris": uris });
        if let Some(position) = position_ms {
            body["position_ms"] = json!(position);
        }
        // No device means whichever one the account is already playing on.
        let query: Vec<(&str, String)> = if device_id.is_empty() {
            Vec::new()
        } else {
            vec![("device_id", device_id.to_string())]
        };
        let accepted = self.put(token, "/me/player/play", &query, &body).await;
        if accepted {
            log::info!("Started {:?} on device {}", uris, device_id);
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> WebApiClient {
        let mut config = AppConfig::new("id", "secret");
        config.api_base_url = server.uri();
        WebApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn start_playback_on_device_at_position() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .and(query_param("device_id", "dev-1"))
            .and(body_json(json!({"uris": ["spotify:track:f"], "position_ms": 40700})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        let uris = vec!["spotify:track:f".to_string()];
        assert!(
            client
                .start_playback(Some("tok"), "dev-1", &uris, Some(40_700))
                .await
        );
    }

    #[tokio::test]
    async fn start_playback_refused() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        let uris = vec!["spotify:track:a".to_string()];
        assert!(!client.start_playback(Some("tok"), "dev-1", &uris, None).await);
    }

    #[tokio::test]
    async fn no_device_means_active_device() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .and(query_param_is_missing("device_id"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        let uris = vec!["spotify:track:a".to_string()];
        assert!(client.start_playback(Some("tok"), "", &uris, None).await);
    }

    #[tokio::test]
    async fn empty_player_is_nothing_playing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let client = client_for(&server).await;
        assert!(client.get_now_playing(Some("tok")).await.is_none());
    }
}
