mod api;
mod config;
mod engine;
mod error;
mod host;
mod store;

pub use api::client::WebApiClient;
pub use api::models::{Device, NowPlaying, Playlist, Track};
pub use api::StreamingApi;
pub use config::{AppConfig, FillerConfig};
pub use engine::queue::{Band, PlayQueue, QueueEntry};
pub use engine::{Engine, EngineHandle};
pub use error::{AppError, AppResult};
pub use host::SessionHost;
pub use store::{SessionSnapshot, Store};

/// Run the engine until Ctrl-C. The config file is the first argument, or
/// `~/.autodj/config.json`.
pub fn run() -> AppResult<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("autodj=info,autodj_lib=info"),
    )
    .init();

    let config_path = match std::env::args_os().nth(1) {
        Some(path) => std::path::PathBuf::from(path),
        None => AppConfig::default_path()?,
    };
    if !config_path.exists() {
        AppConfig::new("", "").save(&config_path)?;
        return Err(AppError::Config(format!(
            "Wrote a config template to {}; fill in client_id and client_secret",
            config_path.display()
        )));
    }
    let config = AppConfig::load(&config_path)?;
    log::info!(
        "Loaded config from {}; session stored at {}",
        config_path.display(),
        config.storage_path.display()
    );

    let host = SessionHost::start(&config)?;
    if let Some(redirect_uri) = &config.redirect_uri {
        log::info!("Log in at {}", host.login_url(redirect_uri)?);
    }

    host.wait_for_shutdown_signal()?;
    host.shutdown()
}
