//! Wall-clock breakdown of the training step

use std::time::{Duration, Instant};
use tracing::info;

/// Phases of a training iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Data,
    Mix,
    Forward,
    Loss,
    Backward,
    Step,
    Ema,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Data,
        Phase::Mix,
        Phase::Forward,
        Phase::Loss,
        Phase::Backward,
        Phase::Step,
        Phase::Ema,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Data => "data",
            Phase::Mix => "mix",
            Phase::Forward => "forward",
            Phase::Loss => "loss",
            Phase::Backward => "backward",
            Phase::Step => "step",
            Phase::Ema => "ema",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulates time spent per [`Phase`]; a disabled timer only runs closures
#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    enabled: bool,
    totals: [Duration; 7],
    calls: [u32; 7],
}

impl PhaseTimer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `f`, charging its duration to `phase`
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let out = f();
        self.record(phase, start.elapsed());
        out
    }

    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        self.totals[phase.index()] += elapsed;
        self.calls[phase.index()] += 1;
    }

    pub fn total(&self, phase: Phase) -> Duration {
        self.totals[phase.index()]
    }

    pub fn calls(&self, phase: Phase) -> u32 {
        self.calls[phase.index()]
    }

    /// Log the per-phase breakdown
    pub fn report(&self, epoch: usize) {
        if !self.enabled {
            return;
        }
        let all: Duration = self.totals.iter().sum();
        info!("Profile of epoch {epoch} ({:.3}s total)", all.as_secs_f64());
        for phase in Phase::ALL {
            let total = self.total(phase);
            let share = if all.is_zero() {
                0.0
            } else {
                100.0 * total.as_secs_f64() / all.as_secs_f64()
            };
            info!(
                "  {:<8} {:>9.3}ms  {:>5.1}%  ({} calls)",
                phase.as_str(),
                total.as_secs_f64() * 1e3,
                share,
                self.calls(phase)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_timer_records_nothing() {
        let mut timer = PhaseTimer::new(false);
        assert_eq!(timer.time(Phase::Forward, || 3), 3);
        assert_eq!(timer.calls(Phase::Forward), 0);
    }

    #[test]
    fn test_enabled_timer_counts_calls() {
        let mut timer = PhaseTimer::new(true);
        timer.time(Phase::Loss, || ());
        timer.time(Phase::Loss, || ());
        timer.record(Phase::Step, Duration::from_millis(5));
        assert_eq!(timer.calls(Phase::Loss), 2);
        assert_eq!(timer.total(Phase::Step), Duration::from_millis(5));
        timer.report(0);
    }
}
