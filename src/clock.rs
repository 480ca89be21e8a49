use crate::config::ClockConfig;

const TIME_EPSILON: f64 = 1e-9;

/// Model time measured in whole reporting intervals `tau`.
///
/// Time is recomputed from the interval count instead of being accumulated,
/// so long runs do not drift away from the reporting grid.
#[derive(Debug, Clone)]
pub struct Clock {
    tau: f64,
    max_time: f64,
    n_ticks: u64,
}

impl Clock {
    pub fn new(cfg: &ClockConfig) -> Self {
        Self {
            tau: cfg.tau,
            max_time: cfg.max_time,
            n_ticks: 0,
        }
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    pub fn time(&self) -> f64 {
        self.n_ticks as f64 * self.tau
    }

    /// Advance the clock by one interval.
    pub fn tick(&mut self) {
        self.n_ticks += 1;
    }

    /// Whether model time has reached the configured maximum.
    pub fn is_finished(&self) -> bool {
        self.time() >= self.max_time - TIME_EPSILON * self.tau
    }

    /// Fraction of the run completed so far, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.max_time <= 0.0 {
            return 1.0;
        }
        (self.time() / self.max_time).min(1.0)
    }
}
