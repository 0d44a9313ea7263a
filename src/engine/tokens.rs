use crate::api::models::{RefreshOutcome, TokenGrant};
use crate::engine::timer::TimerSlot;
use std::time::Duration;

/// Renew this long before the access token actually expires.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(5);
/// Delay before retrying a refresh the service could not answer.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// What the engine has to do after a refresh completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEffect {
    /// New access token installed. `resume` is set for the first refresh
    /// after a restart, which should get playback going again.
    Renewed { resume: bool },
    Retrying,
    /// The refresh token was refused; the session is gone until next login.
    Invalidated,
    /// Superseded by a login while in flight.
    Stale,
}

fn renew_after(expires_in: u64) -> Duration {
    Duration::from_secs(expires_in).saturating_sub(REFRESH_MARGIN)
}

/// Access and refresh tokens plus the refresh timer that keeps them valid.
#[derive(Debug, Default)]
pub struct TokenManager {
    access_token: Option<String>,
    refresh_token: Option<String>,
    timer: TimerSlot,
    in_flight: Option<u64>,
    resume_on_refresh: bool,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from a persisted refresh token, refreshing right away.
    pub fn restore(refresh_token: Option<String>) -> Self {
        let mut tokens = Self::new();
        if let Some(refresh_token) = refresh_token {
            tokens.refresh_token = Some(refresh_token);
            tokens.timer.arm(Duration::ZERO);
            tokens.resume_on_refresh = true;
        }
        tokens
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn timer(&self) -> &TimerSlot {
        &self.timer
    }

    /// Take the tokens of a fresh login and schedule their renewal.
    pub fn install(&mut self, grant: TokenGrant) {
        self.access_token = Some(grant.access_token);
        if let Some(refresh_token) = grant.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.resume_on_refresh = false;
        let delay = renew_after(grant.expires_in);
        self.timer.arm(delay);
        log::info!("Logged in; next token refresh in {:?}", delay);
    }

    /// The refresh timer elapsed. Returns the generation and refresh token
    /// to refresh with, or `None` when there is nothing to do right now.
    pub fn fire(&mut self) -> Option<(u64, String)> {
        let generation = self.timer.fire();
        if self.in_flight.is_some() {
            log::debug!("Refresh still in flight, deferring");
            self.timer.arm(RETRY_DELAY);
            return None;
        }
        let Some(refresh_token) = self.refresh_token.clone() else {
            log::info!("No refresh token; waiting for login");
            return None;
        };
        self.in_flight = Some(generation);
        Some((generation, refresh_token))
    }

    pub fn on_refreshed(&mut self, generation: u64, outcome: RefreshOutcome) -> RefreshEffect {
        if self.in_flight == Some(generation) {
            self.in_flight = None;
        }
        if !self.timer.is_current(generation) {
            return RefreshEffect::Stale;
        }

        match outcome {
            RefreshOutcome::Granted(grant) => {
                self.access_token = Some(grant.access_token);
                if let Some(refresh_token) = grant.refresh_token {
                    self.refresh_token = Some(refresh_token);
                }
                let delay = renew_after(grant.expires_in);
                self.timer.arm(delay);
                log::info!("Access token refreshed; next refresh in {:?}", delay);
                RefreshEffect::Renewed {
                    resume: std::mem::take(&mut self.resume_on_refresh),
                }
            }
            RefreshOutcome::Unavailable => {
                log::warn!("Token endpoint unavailable; retrying in {:?}", RETRY_DELAY);
                self.timer.arm(RETRY_DELAY);
                RefreshEffect::Retrying
            }
            RefreshOutcome::Rejected => {
                log::warn!("Refresh token rejected; login required");
                self.access_token = None;
                self.refresh_token = None;
                self.resume_on_refresh = false;
                self.timer.cancel();
                RefreshEffect::Invalidated
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::grant;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn login_arms_refresh_five_seconds_early() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), 3600));

        assert_eq!(tokens.access_token(), Some("A"));
        assert_eq!(tokens.refresh_token(), Some("R"));
        assert_eq!(
            tokens.timer().deadline(),
            Some(Instant::now() + Duration::from_secs(3595))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_retries_after_one_second() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), 3600));

        let (generation, refresh_token) = tokens.fire().unwrap();
        assert_eq!(refresh_token, "R");
        assert!(!tokens.timer().is_armed());

        let effect = tokens.on_refreshed(generation, RefreshOutcome::Unavailable);
        assert_eq!(effect, RefreshEffect::Retrying);
        assert_eq!(
            tokens.timer().deadline(),
            Some(Instant::now() + Duration::from_secs(1))
        );
        // Still authenticated with the old token while retrying.
        assert_eq!(tokens.access_token(), Some("A"));

        // And it keeps retrying.
        let (generation, _) = tokens.fire().unwrap();
        tokens.on_refreshed(generation, RefreshOutcome::Unavailable);
        assert!(tokens.timer().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_refresh_rearms_and_keeps_refresh_token() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), 3600));
        let (generation, _) = tokens.fire().unwrap();

        let effect = tokens.on_refreshed(
            generation,
            RefreshOutcome::Granted(grant("B", None, 1800)),
        );
        assert_eq!(effect, RefreshEffect::Renewed { resume: false });
        assert_eq!(tokens.access_token(), Some("B"));
        assert_eq!(tokens.refresh_token(), Some("R"));
        assert_eq!(
            tokens.timer().deadline(),
            Some(Instant::now() + Duration::from_secs(1795))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rotated_refresh_token_is_adopted() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), 3600));
        let (generation, _) = tokens.fire().unwrap();
        tokens.on_refreshed(
            generation,
            RefreshOutcome::Granted(grant("B", Some("R2"), 3600)),
        );
        assert_eq!(tokens.refresh_token(), Some("R2"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_clears_session_and_stops() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), 3600));
        let (generation, _) = tokens.fire().unwrap();

        let effect = tokens.on_refreshed(generation, RefreshOutcome::Rejected);
        assert_eq!(effect, RefreshEffect::Invalidated);
        assert!(!tokens.is_authenticated());
        assert_eq!(tokens.refresh_token(), None);
        assert!(!tokens.timer().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn login_supersedes_refresh_in_flight() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), 3600));
        let (generation, _) = tokens.fire().unwrap();

        tokens.install(grant("C", Some("R3"), 3600));
        let effect = tokens.on_refreshed(generation, RefreshOutcome::Rejected);
        assert_eq!(effect, RefreshEffect::Stale);
        assert_eq!(tokens.access_token(), Some("C"));
        assert!(tokens.timer().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_never_overlaps() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), 3600));
        let first = tokens.fire().unwrap();

        // A login lands while the refresh is out, then its timer fires too
        // early for the stale refresh to have come back.
        tokens.install(grant("C", Some("R"), 0));
        assert!(tokens.fire().is_none());
        assert_eq!(
            tokens.timer().deadline(),
            Some(Instant::now() + RETRY_DELAY)
        );

        assert_eq!(
            tokens.on_refreshed(first.0, RefreshOutcome::Unavailable),
            RefreshEffect::Stale
        );
        assert!(tokens.fire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn restored_session_refreshes_immediately_and_resumes() {
        let mut tokens = TokenManager::restore(Some("R".into()));
        assert!(!tokens.is_authenticated());
        assert_eq!(tokens.timer().deadline(), Some(Instant::now()));

        let (generation, refresh_token) = tokens.fire().unwrap();
        assert_eq!(refresh_token, "R");
        let effect = tokens.on_refreshed(
            generation,
            RefreshOutcome::Granted(grant("A", None, 3600)),
        );
        assert_eq!(effect, RefreshEffect::Renewed { resume: true });
    }

    #[tokio::test(start_paused = true)]
    async fn absurd_expiry_does_not_overflow() {
        let mut tokens = TokenManager::new();
        tokens.install(grant("A", Some("R"), u64::MAX));
        assert_eq!(
            tokens.timer().deadline(),
            Some(Instant::now() + crate::engine::timer::MAX_DELAY)
        );
    }

    #[test]
    fn nothing_persisted_means_no_refresh() {
        let tokens = TokenManager::restore(None);
        assert!(!tokens.timer().is_armed());
    }
}
