use crate::api::client::WebApiClient;
use crate::api::models::{Device, Playlist, Track};
use crate::api::StreamingApi;
use crate::config::AppConfig;
use crate::engine::{Engine, EngineHandle};
use crate::error::{AppError, AppResult};
use crate::store::Store;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Blocking entry point for callers that live outside the async world.
///
/// Owns the runtime the engine runs on. Every call waits at most the
/// configured call timeout; a call that times out keeps running inside the
/// engine and only its answer is lost.
pub struct SessionHost {
    runtime: tokio::runtime::Runtime,
    engine: EngineHandle,
    task: JoinHandle<()>,
    call_timeout: Duration,
}

impl SessionHost {
    pub fn start(config: &AppConfig) -> AppResult<Self> {
        let api = Arc::new(WebApiClient::new(config)?);
        Self::with_api(api, config)
    }

    pub fn with_api(api: Arc<dyn StreamingApi>, config: &AppConfig) -> AppResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("autodj-engine")
            .build()?;
        let store = Store::new(&config.storage_path);
        let filler = config.filler.clone();
        let (engine, task) = runtime.block_on(async { Engine::spawn(api, store, filler) })?;
        Ok(Self {
            runtime,
            engine,
            task,
            call_timeout: config.call_timeout(),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.engine.clone()
    }

    fn call<T, F>(&self, operation: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let limit = self.call_timeout;
        self.runtime.block_on(async move {
            tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| AppError::Timeout(limit))?
        })
    }

    pub fn login_url(&self, redirect_uri: &str) -> AppResult<String> {
        self.call(self.engine.login_url(redirect_uri))
    }

    pub fn login(&self, code: &str, redirect_uri: &str) -> AppResult<bool> {
        self.call(self.engine.login(code, redirect_uri))
    }

    pub fn list_devices(&self) -> AppResult<Vec<Device>> {
        self.call(self.engine.list_devices())
    }

    pub fn select_device(&self, device_id: &str) -> AppResult<()> {
        self.call(self.engine.select_device(device_id))
    }

    pub fn list_playlists(&self) -> AppResult<Vec<Playlist>> {
        self.call(self.engine.list_playlists())
    }

    pub fn load_playlist(&self, playlist_id: &str, skip: u32) -> AppResult<()> {
        self.call(self.engine.load_playlist(playlist_id, skip))
    }

    pub fn current_track(&self) -> AppResult<Option<Track>> {
        self.call(self.engine.current_track())
    }

    pub fn queue_length(&self) -> AppResult<usize> {
        self.call(self.engine.queue_length())
    }

    pub fn search(&self, query: &str, page: u32) -> AppResult<Vec<Track>> {
        self.call(self.engine.search(query, page))
    }

    pub fn request_track(&self, track_id: &str) -> AppResult<bool> {
        self.call(self.engine.request_track(track_id))
    }

    pub fn skip_current(&self) -> AppResult<()> {
        self.call(self.engine.skip_current())
    }

    /// Block until Ctrl-C.
    pub fn wait_for_shutdown_signal(&self) -> AppResult<()> {
        self.runtime.block_on(tokio::signal::ctrl_c())?;
        log::info!("Shutdown requested");
        Ok(())
    }

    /// Stop the engine, wait for its final save and tear down the runtime.
    pub fn shutdown(self) -> AppResult<()> {
        let result = self.call(self.engine.shutdown());
        let SessionHost { runtime, task, .. } = self;
        if result.is_ok() {
            if let Err(e) = runtime.block_on(task) {
                log::error!("Engine task ended abnormally: {}", e);
            }
        }
        runtime.shutdown_timeout(Duration::from_secs(1));
        result
    }
}
