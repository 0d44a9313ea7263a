use crate::api::models::Page;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Query parameters as sent on the wire.
pub type Query<'a> = [(&'a str, String)];

/// Thin bearer-token wrapper around the streaming service's web API.
///
/// The client keeps no session state: every call receives the access token
/// to attach. Failures never escape [`WebApiClient::get`],
/// [`WebApiClient::put`] or [`WebApiClient::paginate`]; they are logged and
/// turned into `None`, `false` or a short result.
pub struct WebApiClient {
    http: reqwest::Client,
    api_base_url: String,
    pub(crate) accounts_base_url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) market: String,
    pub(crate) search_page_size: u32,
}

impl WebApiClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("autodj/0.1.0")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            accounts_base_url: config.accounts_base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            market: config.market.clone(),
            search_page_size: config.search_page_size,
        })
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    fn auth_headers(token: Option<&str>) -> AppResult<HeaderMap> {
        let token = token.ok_or(AppError::AuthRequired)?;
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AppError::Config(e.to_string()))?,
        );
        Ok(headers)
    }

    async fn try_get(
        &self,
        token: Option<&str>,
        path: &str,
        query: &Query<'_>,
    ) -> AppResult<serde_json::Value> {
        let url = format!("{}{}", self.api_base_url, path);
        let headers = Self::auth_headers(token)?;
        log::debug!("GET {} {:?}", path, query);

        let response = self
            .http
            .get(&url)
            .headers(headers)
            .query(query)
            .send()
            .await?;
        let response = self.check_response(response).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(serde_json::Value::Null);
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn try_put(
        &self,
        token: Option<&str>,
        path: &str,
        query: &Query<'_>,
        body: &serde_json::Value,
    ) -> AppResult<()> {
        let url = format!("{}{}", self.api_base_url, path);
        let headers = Self::auth_headers(token)?;
        log::debug!("PUT {} {:?} {}", path, query, body);

        let response = self
            .http
            .put(&url)
            .headers(headers)
            .query(query)
            .json(body)
            .send()
            .await?;
        self.check_response(response).await?;
        Ok(())
    }

    /// GET a JSON resource. `None` means the service is unavailable for
    /// this call; an empty 204 answer comes back as `Some(Value::Null)`.
    pub async fn get(
        &self,
        token: Option<&str>,
        path: &str,
        query: &Query<'_>,
    ) -> Option<serde_json::Value> {
        match self.try_get(token, path, query).await {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("GET {} unavailable: {}", path, e);
                None
            }
        }
    }

    /// PUT a JSON body. Returns whether the service accepted it.
    pub async fn put(
        &self,
        token: Option<&str>,
        path: &str,
        query: &Query<'_>,
        body: &serde_json::Value,
    ) -> bool {
        match self.try_put(token, path, query, body).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("PUT {} unavailable: {}", path, e);
                false
            }
        }
    }

    /// Follow an offset-paginated listing from `start_offset` until the
    /// service reports no further page, collecting every item in order.
    /// A page that cannot be fetched ends the walk with what was gathered.
    pub async fn paginate(
        &self,
        token: Option<&str>,
        path: &str,
        query: &Query<'_>,
        start_offset: u32,
    ) -> Vec<serde_json::Value> {
        let mut items = Vec::new();
        let mut offset = start_offset;

        loop {
            let mut params = query.to_vec();
            params.push(("offset", offset.to_string()));

            let Some(body) = self.get(token, path, &params).await else {
                break;
            };
            let page: Page = match serde_json::from_value(body) {
                Ok(page) => page,
                Err(e) => {
                    log::warn!("Malformed page from {} at offset {}: {}", path, offset, e);
                    break;
                }
            };

            let next = page.next_offset(offset);
            items.extend(page.items);
            match next {
                Some(next) => offset = next,
                None => break,
            }
        }

        log::debug!("Paginated {} items from {}", items.len(), path);
        items
    }

    async fn check_response(&self, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::UNAUTHORIZED {
            Err(AppError::AuthRequired)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(AppError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> WebApiClient {
        let mut config = AppConfig::new("id", "secret");
        config.api_base_url = server.uri();
        config.accounts_base_url = server.uri();
        WebApiClient::new(&config).unwrap()
    }

    async fn mount_page(server: &MockServer, offset: u32, ids: &[&str], next: Option<&str>) {
        let items: Vec<_> = ids.iter().map(|id| json!({ "id": id })).collect();
        Mock::given(method("GET"))
            .and(path("/me/playlists"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": items,
                "limit": 2,
                "next": next,
            })))
            .mount(server)
            .await;
    }

    fn ids(items: &[serde_json::Value]) -> Vec<&str> {
        items.iter().filter_map(|v| v["id"].as_str()).collect()
    }

    #[test]
    fn trims_trailing_slash_from_base_urls() {
        let mut config = AppConfig::new("id", "secret");
        config.api_base_url = "http://localhost:9000/v1/".into();
        config.accounts_base_url = "http://localhost:9001/".into();
        let client = WebApiClient::new(&config).unwrap();
        assert_eq!(client.api_base_url, "http://localhost:9000/v1");
        assert_eq!(client.accounts_base_url, "http://localhost:9001");
    }

    #[test]
    fn missing_token_is_auth_required() {
        assert!(matches!(
            WebApiClient::auth_headers(None),
            Err(AppError::AuthRequired)
        ));
        let headers = WebApiClient::auth_headers(Some("abc")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
    }

    #[tokio::test]
    async fn get_without_token_is_unavailable() {
        let client = WebApiClient::new(&AppConfig::new("id", "secret")).unwrap();
        assert!(client.get(None, "/me/player", &[]).await.is_none());
        assert!(!client.put(None, "/me/player", &[], &serde_json::json!({})).await);
        assert!(client.paginate(None, "/me/playlists", &[], 0).await.is_empty());
    }

    #[tokio::test]
    async fn paginate_follows_offsets_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, 0, &["a", "b"], Some("more")).await;
        mount_page(&server, 2, &["c"], None).await;
        let client = client_for(&server).await;

        let query = [("limit", "2".to_string())];
        let items = client.paginate(Some("tok"), "/me/playlists", &query, 0).await;
        assert_eq!(ids(&items), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn paginate_starts_at_given_offset() {
        let server = MockServer::start().await;
        mount_page(&server, 2, &["c"], None).await;
        let client = client_for(&server).await;

        let items = client.paginate(Some("tok"), "/me/playlists", &[], 2).await;
        assert_eq!(ids(&items), ["c"]);
    }

    #[tokio::test]
    async fn failed_page_keeps_what_was_collected() {
        let server = MockServer::start().await;
        mount_page(&server, 0, &["a", "b"], Some("more")).await;
        Mock::given(method("GET"))
            .and(path("/me/playlists"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        let items = client.paginate(Some("tok"), "/me/playlists", &[], 0).await;
        assert_eq!(ids(&items), ["a", "b"]);
    }

    #[tokio::test]
    async fn get_attaches_bearer_and_maps_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "me"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        let me = client.get(Some("tok"), "/me", &[]).await.unwrap();
        assert_eq!(me["id"], "me");
        assert!(client.get(Some("tok"), "/broken", &[]).await.is_none());
        assert_eq!(
            client.get(Some("tok"), "/me/player", &[]).await,
            Some(serde_json::Value::Null)
        );
    }

    #[tokio::test]
    async fn put_reports_rejection_as_false() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = client_for(&server).await;
        assert!(!client.put(Some("tok"), "/me/player", &[], &json!({})).await);
    }
}
