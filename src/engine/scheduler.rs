use crate::api::models::{NowPlaying, Track};
use crate::engine::queue::{PlayQueue, QueueEntry};
use crate::engine::timer::TimerSlot;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing armed; playback has not been started.
    Idle,
    /// Asking the remote what it is playing before taking over.
    Resuming,
    /// Timer armed for a known delay (start-up or skip cooldown).
    Waiting,
    /// Timer fired with nothing queued; the next enqueue plays at once.
    AwaitingTrack,
    /// A play command is out for the dequeued track.
    Issuing,
    /// A track is playing and the timer is armed for its length.
    Playing,
}

/// Timer-driven playback state machine.
///
/// The scheduler only decides; the engine performs the remote calls and
/// reports back with the generation it was handed. Any cancel or re-arm in
/// the meantime makes that report stale and it is dropped.
#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
    timer: TimerSlot,
    current_track: Option<Track>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            timer: TimerSlot::new(),
            current_track: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn timer(&self) -> &TimerSlot {
        &self.timer
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    /// Cancel whatever is armed and start over from the remote's actual
    /// state. Returns the generation for the now-playing query.
    pub fn begin_start(&mut self) -> u64 {
        self.state = SchedulerState::Resuming;
        self.timer.cancel()
    }

    /// Let a track already playing remotely finish before taking over;
    /// otherwise take over immediately.
    pub fn on_now_playing(&mut self, generation: u64, now: Option<NowPlaying>) -> bool {
        if !self.timer.is_current(generation) || self.state != SchedulerState::Resuming {
            return false;
        }

        let remote = now.and_then(|now| {
            let remaining = now.remaining()?;
            now.item.map(|track| (track, remaining))
        });
        match remote {
            Some((track, remaining)) => {
                log::info!(
                    "Remote is playing {} ({:?} left); queue takes over after it",
                    track.name,
                    remaining
                );
                self.current_track = Some(track);
                self.timer.arm(remaining);
                self.state = SchedulerState::Playing;
            }
            None => {
                self.timer.arm(Duration::ZERO);
                self.state = SchedulerState::Waiting;
            }
        }
        true
    }

    /// The timer elapsed: the next enqueue or queued entry plays.
    pub fn fire(&mut self) {
        self.timer.fire();
        self.state = SchedulerState::AwaitingTrack;
    }

    /// Dequeue the next entry if the scheduler is waiting for one. Returns
    /// the entry with the generation its play command belongs to.
    pub fn take_next(&mut self, queue: &mut PlayQueue) -> Option<(u64, QueueEntry)> {
        if self.state != SchedulerState::AwaitingTrack {
            return None;
        }
        let entry = queue.dequeue()?;
        self.state = SchedulerState::Issuing;
        Some((self.timer.generation(), entry))
    }

    pub fn on_track_started(&mut self, generation: u64, track: Track) -> bool {
        if !self.timer.is_current(generation) || self.state != SchedulerState::Issuing {
            return false;
        }
        self.timer.arm(track.duration());
        self.current_track = Some(track);
        self.state = SchedulerState::Playing;
        true
    }

    /// Drop the running track's timer ahead of the filler clip.
    pub fn begin_skip(&mut self) -> u64 {
        self.state = SchedulerState::Waiting;
        self.timer.cancel()
    }

    pub fn on_filler_started(&mut self, generation: u64, length: Duration) -> bool {
        if !self.timer.is_current(generation) {
            return false;
        }
        self.timer.arm(length);
        self.state = SchedulerState::Waiting;
        true
    }

    pub fn shutdown(&mut self) {
        self.timer.cancel();
        self.state = SchedulerState::Idle;
    }
}
