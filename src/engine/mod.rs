pub mod queue;
pub mod scheduler;
pub mod timer;
pub mod tokens;


use crate::api::models::{Device, NowPlaying, Playlist, RefreshOutcome, TokenGrant, Track};
use crate::api::StreamingApi;
use crate::config::FillerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{SessionSnapshot, Store};
use queue::{Band, PlayQueue};
use scheduler::Scheduler;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokens::{RefreshEffect, TokenManager};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    LoginUrl {
        redirect_uri: String,
        reply: Reply<String>,
    },
    Login {
        code: String,
        redirect_uri: String,
        reply: Reply<bool>,
    },
    ListDevices {
        reply: Reply<Vec<Device>>,
    },
    SelectDevice {
        device_id: String,
        reply: Reply<()>,
    },
    ListPlaylists {
        reply: Reply<Vec<Playlist>>,
    },
    LoadPlaylist {
        playlist_id: String,
        skip: u32,
        reply: Reply<()>,
    },
    CurrentTrack {
        reply: Reply<Option<Track>>,
    },
    QueueLength {
        reply: Reply<usize>,
    },
    Search {
        query: String,
        page: u32,
        reply: Reply<Vec<Track>>,
    },
    RequestTrack {
        track_id: String,
        reply: Reply<bool>,
    },
    SkipCurrent {
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Results of remote calls, fed back into the engine task.
enum Completion {
    LoggedIn {
        grant: Option<TokenGrant>,
        reply: Reply<bool>,
    },
    Refreshed {
        generation: u64,
        outcome: RefreshOutcome,
    },
    NowPlaying {
        generation: u64,
        now: Option<NowPlaying>,
    },
    TrackStarted {
        generation: u64,
        track: Track,
        accepted: bool,
    },
    FillerStarted {
        generation: u64,
        accepted: bool,
    },
    DeviceSelected {
        accepted: bool,
        reply: Reply<()>,
    },
    PlaylistLoaded {
        reload: u64,
        timestamp: i64,
        tracks: Vec<Track>,
        reply: Reply<()>,
    },
    TrackFetched {
        track_id: String,
        track: Option<Track>,
        reply: Reply<bool>,
    },
}

fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Cloneable front door to a running [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
}

impl EngineHandle {
    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> AppResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| AppError::EngineStopped)?;
        response.await.map_err(|_| AppError::EngineStopped)
    }

    pub async fn login_url(&self, redirect_uri: &str) -> AppResult<String> {
        let redirect_uri = redirect_uri.to_string();
        self.call(|reply| Command::LoginUrl {
            redirect_uri,
            reply,
        })
        .await
    }

    pub async fn login(&self, code: &str, redirect_uri: &str) -> AppResult<bool> {
        let code = code.to_string();
        let redirect_uri = redirect_uri.to_string();
        self.call(|reply| Command::Login {
            code,
            redirect_uri,
            reply,
        })
        .await
    }

    pub async fn list_devices(&self) -> AppResult<Vec<Device>> {
        self.call(|reply| Command::ListDevices { reply }).await
    }

    pub async fn select_device(&self, device_id: &str) -> AppResult<()> {
        let device_id = device_id.to_string();
        self.call(|reply| Command::SelectDevice { device_id, reply })
            .await
    }

    pub async fn list_playlists(&self) -> AppResult<Vec<Playlist>> {
        self.call(|reply| Command::ListPlaylists { reply }).await
    }

    /// Replace the playlist part of the queue with `playlist_id`, starting
    /// `skip` tracks in. Resolves once the new tracks are queued.
    pub async fn load_playlist(&self, playlist_id: &str, skip: u32) -> AppResult<()> {
        let playlist_id = playlist_id.to_string();
        self.call(|reply| Command::LoadPlaylist {
            playlist_id,
            skip,
            reply,
        })
        .await
    }

    pub async fn current_track(&self) -> AppResult<Option<Track>> {
        self.call(|reply| Command::CurrentTrack { reply }).await
    }

    pub async fn queue_length(&self) -> AppResult<usize> {
        self.call(|reply| Command::QueueLength { reply }).await
    }

    pub async fn search(&self, query: &str, page: u32) -> AppResult<Vec<Track>> {
        let query = query.to_string();
        self.call(|reply| Command::Search { query, page, reply })
            .await
    }

    /// Queue a track ahead of the playlist. `false` if it is already queued
    /// or could not be looked up.
    pub async fn request_track(&self, track_id: &str) -> AppResult<bool> {
        let track_id = track_id.to_string();
        self.call(|reply| Command::RequestTrack { track_id, reply })
            .await
    }

    pub async fn skip_current(&self) -> AppResult<()> {
        self.call(|reply| Command::SkipCurrent { reply }).await
    }

    /// Stop timers, write the final snapshot and end the engine task.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.call(|reply| Command::Shutdown { reply }).await
    }
}

/// Owner of all session state.
///
/// Runs as a single task: commands, timer firings and remote call results
/// are handled one at a time, so nothing here needs a lock. Remote calls
/// run as their own tasks and report back through `completions`.
pub struct Engine {
    api: Arc<dyn StreamingApi>,
    store: Store,
    filler: FillerConfig,
    device_id: String,
    tokens: TokenManager,
    queue: PlayQueue,
    scheduler: Scheduler,
    pending_requests: HashSet<String>,
    playlist_reload: u64,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
}

impl Engine {
    /// Restore the persisted session from `store` and start the engine on
    /// the current tokio runtime.
    pub fn spawn(
        api: Arc<dyn StreamingApi>,
        store: Store,
        filler: FillerConfig,
    ) -> AppResult<(EngineHandle, JoinHandle<()>)> {
        let SessionSnapshot {
            selected_device_id,
            refresh_token,
            entries,
        } = store.load()?;

        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let engine = Engine {
            api,
            store,
            filler,
            device_id: selected_device_id,
            tokens: TokenManager::restore(refresh_token),
            queue: PlayQueue::from_entries(entries),
            scheduler: Scheduler::new(),
            pending_requests: HashSet::new(),
            playlist_reload: 0,
            commands,
            completions_tx,
            completions,
        };
        let task = tokio::spawn(engine.run());
        Ok((
            EngineHandle {
                commands: commands_tx,
            },
            task,
        ))
    }

    async fn run(mut self) {
        log::info!(
            "Engine started ({} queued, device {:?})",
            self.queue.len(),
            self.device_id
        );
        loop {
            let scheduler_deadline = self.scheduler.timer().deadline();
            let refresh_deadline = self.tokens.timer().deadline();
            tokio::select! {
                Some(completion) = self.completions.recv() => self.on_completion(completion),
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.on_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                () = timer::wait(scheduler_deadline) => self.on_scheduler_timer(),
                () = timer::wait(refresh_deadline) => self.on_refresh_timer(),
            }
        }
        log::info!("Engine stopped");
    }

    fn access_token(&self) -> Option<String> {
        self.tokens.access_token().map(str::to_owned)
    }

    /// Run `call` on its own task and feed its result back as a completion.
    /// A panicking call reports `None`.
    fn spawn_call<T, F, C>(&self, call: F, complete: C)
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
        C: FnOnce(Option<T>) -> Completion + Send + 'static,
    {
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::spawn(call).await {
                Ok(value) => Some(value),
                Err(e) => {
                    log::error!("Remote call task failed: {}", e);
                    None
                }
            };
            // Closed once the engine has stopped; the result is moot then.
            let _ = completions.send(complete(result));
        });
    }

    /// Like [`Self::spawn_call`] for calls that touch no engine state: the
    /// result goes straight to the caller.
    fn spawn_reply<T, F>(call: F, reply: Reply<T>)
    where
        T: Default + Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        tokio::spawn(async move {
            let value = match tokio::spawn(call).await {
                Ok(value) => value,
                Err(e) => {
                    log::error!("Remote call task failed: {}", e);
                    T::default()
                }
            };
            let _ = reply.send(value);
        });
    }

    fn persist(&self) {
        let snapshot = SessionSnapshot {
            selected_device_id: self.device_id.clone(),
            refresh_token: self.tokens.refresh_token().map(str::to_owned),
            entries: self.queue.entries(),
        };
        if let Err(e) = self.store.save(&snapshot) {
            log::error!("Failed to save session to {}: {}", self.store.path().display(), e);
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::LoginUrl {
                redirect_uri,
                reply,
            } => {
                let _ = reply.send(self.api.login_url(&redirect_uri));
            }
            Command::Login {
                code,
                redirect_uri,
                reply,
            } => {
                let api = self.api.clone();
                self.spawn_call(
                    async move { api.exchange_code(&code, &redirect_uri).await },
                    |grant| Completion::LoggedIn {
                        grant: grant.flatten(),
                        reply,
                    },
                );
            }
            Command::ListDevices { reply } => {
                let api = self.api.clone();
                let token = self.access_token();
                Self::spawn_reply(
                    async move { api.devices(token.as_deref()).await.unwrap_or_default() },
                    reply,
                );
            }
            Command::SelectDevice { device_id, reply } => {
                log::info!("Selected device {}", device_id);
                self.device_id = device_id.clone();
                self.persist();
                let api = self.api.clone();
                let token = self.access_token();
                self.spawn_call(
                    async move { api.transfer_playback(token.as_deref(), &device_id).await },
                    |accepted| Completion::DeviceSelected {
                        accepted: accepted.unwrap_or(false),
                        reply,
                    },
                );
            }
            Command::ListPlaylists { reply } => {
                let api = self.api.clone();
                let token = self.access_token();
                Self::spawn_reply(async move { api.playlists(token.as_deref()).await }, reply);
            }
            Command::LoadPlaylist {
                playlist_id,
                skip,
                reply,
            } => self.load_playlist(playlist_id, skip, reply),
            Command::CurrentTrack { reply } => {
                let _ = reply.send(self.scheduler.current_track().cloned());
            }
            Command::QueueLength { reply } => {
                let _ = reply.send(self.queue.len());
            }
            Command::Search { query, page, reply } => {
                let api = self.api.clone();
                let token = self.access_token();
                Self::spawn_reply(
                    async move {
                        api.search_tracks(token.as_deref(), &query, page)
                            .await
                            .unwrap_or_default()
                    },
                    reply,
                );
            }
            Command::RequestTrack { track_id, reply } => self.request_track(track_id, reply),
            Command::SkipCurrent { reply } => {
                self.skip_current();
                let _ = reply.send(());
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::LoggedIn { grant, reply } => {
                let Some(grant) = grant else {
                    log::warn!("Login failed; keeping the current session");
                    let _ = reply.send(false);
                    return;
                };
                self.tokens.install(grant);
                self.persist();
                self.start_scheduler();
                let _ = reply.send(true);
            }
            Completion::Refreshed {
                generation,
                outcome,
            } => match self.tokens.on_refreshed(generation, outcome) {
                RefreshEffect::Renewed { resume } => {
                    self.persist();
                    if resume {
                        self.start_scheduler();
                    }
                }
                RefreshEffect::Invalidated => self.persist(),
                RefreshEffect::Retrying => {}
                RefreshEffect::Stale => log::debug!("Discarding superseded token refresh"),
            },
            Completion::NowPlaying { generation, now } => {
                if !self.scheduler.on_now_playing(generation, now) {
                    log::debug!("Discarding stale now-playing result");
                }
            }
            Completion::TrackStarted {
                generation,
                track,
                accepted,
            } => {
                if !accepted {
                    log::warn!("Play command for {} was not accepted", track.name);
                }
                if !self.scheduler.on_track_started(generation, track) {
                    log::debug!("Discarding stale play result");
                }
            }
            Completion::FillerStarted {
                generation,
                accepted,
            } => {
                if !accepted {
                    log::warn!("Filler clip was not accepted");
                }
                let length = Duration::from_secs(self.filler.duration_secs);
                self.scheduler.on_filler_started(generation, length);
            }
            Completion::DeviceSelected { accepted, reply } => {
                if !accepted {
                    log::warn!("Playback transfer to {} failed", self.device_id);
                }
                if self.tokens.is_authenticated() {
                    self.start_scheduler();
                }
                let _ = reply.send(());
            }
            Completion::PlaylistLoaded {
                reload,
                timestamp,
                tracks,
                reply,
            } => {
                self.on_playlist_loaded(reload, timestamp, tracks);
                let _ = reply.send(());
            }
            Completion::TrackFetched {
                track_id,
                track,
                reply,
            } => {
                self.pending_requests.remove(&track_id);
                let Some(track) = track else {
                    log::warn!("Track {} could not be looked up", track_id);
                    let _ = reply.send(false);
                    return;
                };
                let queued = self
                    .queue
                    .enqueue_track(Band::Requested, now_timestamp(), track);
                if queued {
                    self.persist();
                    self.feed_scheduler();
                }
                let _ = reply.send(queued);
            }
        }
    }

    fn load_playlist(&mut self, playlist_id: String, skip: u32, reply: Reply<()>) {
        self.playlist_reload += 1;
        let reload = self.playlist_reload;
        let drained = self.queue.drain_band(Band::Playlist);
        log::info!(
            "Loading playlist {} from track {} (dropped {} playlist entries)",
            playlist_id,
            skip,
            drained
        );
        self.persist();

        let timestamp = now_timestamp();
        let api = self.api.clone();
        let token = self.access_token();
        self.spawn_call(
            async move {
                api.playlist_tracks(token.as_deref(), &playlist_id, skip)
                    .await
            },
            move |tracks| Completion::PlaylistLoaded {
                reload,
                timestamp,
                tracks: tracks.unwrap_or_default(),
                reply,
            },
        );
    }

    fn on_playlist_loaded(&mut self, reload: u64, timestamp: i64, tracks: Vec<Track>) {
        if reload != self.playlist_reload {
            log::debug!("Discarding tracks of superseded playlist load");
            return;
        }
        let mut added = 0;
        for track in tracks {
            if self.pending_requests.contains(&track.id) {
                continue;
            }
            if self.queue.enqueue_track(Band::Playlist, timestamp, track) {
                added += 1;
            }
        }
        log::info!(
            "Queued {} playlist tracks behind {} requests",
            added,
            self.queue.band_len(Band::Requested)
        );
        self.persist();
        self.feed_scheduler();
    }

    fn request_track(&mut self, track_id: String, reply: Reply<bool>) {
        if self.queue.contains(&track_id) || !self.pending_requests.insert(track_id.clone()) {
            log::info!("Track {} is already queued", track_id);
            let _ = reply.send(false);
            return;
        }
        let api = self.api.clone();
        let token = self.access_token();
        let id = track_id.clone();
        self.spawn_call(
            async move { api.track(token.as_deref(), &id).await },
            |track| Completion::TrackFetched {
                track_id,
                track: track.flatten(),
                reply,
            },
        );
    }

    fn skip_current(&mut self) {
        let generation = self.scheduler.begin_skip();
        log::info!("Skipping current track");
        let api = self.api.clone();
        let token = self.access_token();
        let device_id = self.device_id.clone();
        let uris = vec![self.filler.uri.clone()];
        let position_ms = self.filler.position_ms;
        self.spawn_call(
            async move {
                api.start_playback(token.as_deref(), &device_id, &uris, Some(position_ms))
                    .await
            },
            move |accepted| Completion::FillerStarted {
                generation,
                accepted: accepted.unwrap_or(false),
            },
        );
    }

    /// (Re)start playback scheduling from whatever the remote is doing.
    fn start_scheduler(&mut self) {
        let generation = self.scheduler.begin_start();
        let api = self.api.clone();
        let token = self.access_token();
        self.spawn_call(
            async move { api.now_playing(token.as_deref()).await },
            move |now| Completion::NowPlaying {
                generation,
                now: now.flatten(),
            },
        );
    }

    /// Hand the next queued track to the scheduler if it is waiting for one.
    fn feed_scheduler(&mut self) {
        let Some((generation, entry)) = self.scheduler.take_next(&mut self.queue) else {
            return;
        };
        self.persist();
        log::info!("Playing {} by {}", entry.track.name, entry.track.artist_name);

        let api = self.api.clone();
        let token = self.access_token();
        let device_id = self.device_id.clone();
        let track = entry.track;
        let uris = vec![track.uri.clone()];
        self.spawn_call(
            async move {
                api.start_playback(token.as_deref(), &device_id, &uris, None)
                    .await
            },
            move |accepted| Completion::TrackStarted {
                generation,
                track,
                accepted: accepted.unwrap_or(false),
            },
        );
    }

    fn on_scheduler_timer(&mut self) {
        self.scheduler.fire();
        if self.queue.is_empty() {
            log::info!("Queue is empty; playing the next track as soon as one arrives");
            return;
        }
        self.feed_scheduler();
    }

    fn on_refresh_timer(&mut self) {
        let Some((generation, refresh_token)) = self.tokens.fire() else {
            return;
        };
        let api = self.api.clone();
        self.spawn_call(
            async move { api.refresh(&refresh_token).await },
            move |outcome| Completion::Refreshed {
                generation,
                outcome: outcome.unwrap_or(RefreshOutcome::Unavailable),
            },
        );
    }

    fn shutdown(&mut self) {
        self.tokens.shutdown();
        self.scheduler.shutdown();
        self.persist();
        log::info!("Session saved to {}", self.store.path().display());
    }
}
