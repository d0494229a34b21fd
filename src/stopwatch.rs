use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Running,
    Paused,
}

/// Elapsed-time tracker driven by monotonic instants supplied by the tick
/// loop. Elapsed is non-decreasing while running, frozen while paused, and
/// zeroed (with laps cleared) by reset.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    phase: Phase,
    started_at: Option<Instant>,
    accumulated: Duration,
    laps: Vec<Duration>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            phase: Phase::Stopped,
            started_at: None,
            accumulated: Duration::ZERO,
            laps: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn start(&mut self, now: Instant) {
        if self.phase == Phase::Stopped {
            self.started_at = Some(now);
            self.phase = Phase::Running;
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.phase == Phase::Running {
            self.accumulated += self.running_since(now);
            self.started_at = None;
            self.phase = Phase::Paused;
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if self.phase == Phase::Paused {
            self.started_at = Some(now);
            self.phase = Phase::Running;
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Stopped;
        self.started_at = None;
        self.accumulated = Duration::ZERO;
        self.laps.clear();
    }

    /// Records the elapsed time at the moment of the call. Valid only while
    /// running; otherwise `None`.
    pub fn lap(&mut self, now: Instant) -> Option<Duration> {
        if self.phase != Phase::Running {
            return None;
        }
        let at = self.elapsed(now);
        self.laps.push(at);
        Some(at)
    }

    pub fn laps(&self) -> &[Duration] {
        &self.laps
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.phase {
            Phase::Running => self.accumulated + self.running_since(now),
            Phase::Paused | Phase::Stopped => self.accumulated,
        }
    }

    fn running_since(&self, now: Instant) -> Duration {
        self.started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Countdown variant of the same machine: displayed value is `target -
/// elapsed`, clamped at zero. Reaching zero yields a one-shot completion
/// signal from [`CountdownTimer::tick`].
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    target: Duration,
    watch: Stopwatch,
    completed: bool,
}

impl CountdownTimer {
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            watch: Stopwatch::new(),
            completed: false,
        }
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    pub fn phase(&self) -> Phase {
        self.watch.phase()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn start(&mut self, now: Instant) {
        self.watch.start(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.watch.pause(now);
    }

    pub fn resume(&mut self, now: Instant) {
        self.watch.resume(now);
    }

    pub fn reset(&mut self) {
        self.watch.reset();
        self.completed = false;
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.target.saturating_sub(self.watch.elapsed(now))
    }

    /// Per-tick recompute. Returns `true` exactly once, on the first tick
    /// that observes the countdown reaching zero while running.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.completed || self.watch.phase() != Phase::Running {
            return false;
        }
        if self.watch.elapsed(now) >= self.target {
            self.completed = true;
            return true;
        }
        false
    }
}
