use std::io::Write;
use std::time::{Duration, Instant};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Spinner on stderr, ticked once per processed top-level task (completed
/// and skipped tasks included). Repaints are throttled so large exports do
/// not spend their time redrawing a terminal line.
pub struct Progress {
    total: usize,
    completed: usize,
    spinner_pos: usize,
    last_update: Option<Instant>,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            spinner_pos: 0,
            last_update: None,
        }
    }

    pub fn tick(&mut self) {
        self.completed += 1;

        let now = Instant::now();
        let due = match self.last_update {
            None => true,
            Some(at) => now.duration_since(at) > UPDATE_INTERVAL,
        };
        if !due {
            return;
        }

        let pct = if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        };
        eprint!(
            "\r{}    {:>6} / {:>6} ({:>6.2}%)",
            SPINNER[self.spinner_pos], self.completed, self.total, pct
        );
        let _ = std::io::stderr().flush();
        self.spinner_pos = (self.spinner_pos + 1) % SPINNER.len();
        self.last_update = Some(now);
    }

    /// Terminate the in-place status line.
    pub fn finish(&self) {
        if self.last_update.is_some() {
            eprintln!();
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }
}
