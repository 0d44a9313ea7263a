use std::time::Duration;
use tokio::time::Instant;

/// Longest delay a slot will arm for; anything later is treated as this.
pub const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A slot holding at most one pending deadline.
///
/// Arming replaces whatever was armed before. Every arm or cancel bumps the
/// generation, so work started under an older generation can be recognised
/// as stale when it completes.
#[derive(Debug, Default)]
pub struct TimerSlot {
    deadline: Option<Instant>,
    generation: u64,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration) -> u64 {
        self.generation += 1;
        self.deadline = Some(Instant::now() + delay.min(MAX_DELAY));
        self.generation
    }

    /// Disarm. Harmless when nothing is armed.
    pub fn cancel(&mut self) -> u64 {
        self.generation += 1;
        self.deadline = None;
        self.generation
    }

    /// Clear an elapsed deadline, keeping the generation so work started
    /// from this firing stays current.
    pub fn fire(&mut self) -> u64 {
        self.deadline = None;
        self.generation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

/// Resolve at `deadline`, or never when there is none.
pub async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
