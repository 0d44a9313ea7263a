use crate::api::client::WebApiClient;
use crate::api::models::{RefreshOutcome, TokenGrant};
use crate::error::{AppError, AppResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;

const SCOPES: [&str; 5] = [
    "user-read-playback-state",
    "user-read-currently-playing",
    "user-modify-playback-state",
    "playlist-read-private",
    "playlist-read-collaborative",
];

pub fn build_login_url(accounts_base_url: &str, client_id: &str, redirect_uri: &str) -> String {
    let scopes = SCOPES.join(" ");
    format!(
        "{}/authorize?response_type=code&client_id={}&scope={}&redirect_uri={}",
        accounts_base_url.trim_end_matches('/'),
        urlencoding::encode(client_id),
        urlencoding::encode(&scopes),
        urlencoding::encode(redirect_uri)
    )
}

/// POST a grant to the token endpoint with client credentials in a Basic
/// header. Returns the status and the decoded JSON body.
async fn post_token_form(
    http: &reqwest::Client,
    accounts_base_url: &str,
    client_id: &str,
    client_secret: &str,
    params: &[(&str, &str)],
) -> AppResult<(StatusCode, serde_json::Value)> {
    let credentials = format!("{}:{}", client_id, client_secret);
    let b64_creds = STANDARD.encode(credentials.as_bytes());
    let url = format!("{}/api/token", accounts_base_url);

    let response = http
        .post(&url)
        .header("Authorization", format!("Basic {}", b64_creds))
        .form(params)
        .send()
        .await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    Ok((status, body))
}

pub async fn exchange_code(
    http: &reqwest::Client,
    accounts_base_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> AppResult<TokenGrant> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];

    let (status, body) =
        post_token_form(http, accounts_base_url, client_id, client_secret, &params).await?;
    if !status.is_success() {
        return Err(AppError::Api {
            status: status.as_u16(),
            message: format!("Token exchange failed: {}", body),
        });
    }

    let grant: TokenGrant = serde_json::from_value(body)?;
    if grant.refresh_token.is_none() {
        return Err(AppError::Api {
            status: status.as_u16(),
            message: "Token exchange returned no refresh token".into(),
        });
    }
    Ok(grant)
}

/// Decide what a token endpoint answer to a refresh grant means.
///
/// Server errors and rate limiting are treated as the service being
/// unavailable. Any other answer without a usable access token is an
/// explicit rejection of the refresh token.
pub fn classify_refresh(status: StatusCode, body: serde_json::Value) -> RefreshOutcome {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return RefreshOutcome::Unavailable;
    }
    if !status.is_success() {
        return RefreshOutcome::Rejected;
    }
    match serde_json::from_value::<TokenGrant>(body) {
        Ok(grant) => RefreshOutcome::Granted(grant),
        Err(_) => RefreshOutcome::Rejected,
    }
}

pub async fn refresh_user_token(
    http: &reqwest::Client,
    accounts_base_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> RefreshOutcome {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];

    match post_token_form(http, accounts_base_url, client_id, client_secret, &params).await {
        Ok((status, body)) => classify_refresh(status, body),
        Err(AppError::Http(e)) if e.is_decode() => {
            log::warn!("Token refresh answered with an undecodable body: {}", e);
            RefreshOutcome::Unavailable
        }
        Err(e) => {
            log::warn!("Token refresh unavailable: {}", e);
            RefreshOutcome::Unavailable
        }
    }
}

impl WebApiClient {
    pub async fn login(&self, code: &str, redirect_uri: &str) -> Option<TokenGrant> {
        match exchange_code(
            self.http_client(),
            &self.accounts_base_url,
            &self.client_id,
            &self.client_secret,
            code,
            redirect_uri,
        )
        .await
        {
            Ok(grant) => Some(grant),
            Err(e) => {
                log::warn!("Authorization code exchange failed: {}", e);
                None
            }
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> RefreshOutcome {
        refresh_user_token(
            self.http_client(),
            &self.accounts_base_url,
            &self.client_id,
            &self.client_secret,
            refresh_token,
        )
        .await
    }
}
