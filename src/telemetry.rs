//! Ambient "system log" ticker shown beside the chat.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Local;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const TELEMETRY_INTERVAL: Duration = Duration::from_secs(2);
pub const MAX_LINES: usize = 12;

const LINES: [&str; 13] = [
    "Connecting to server 192.168.X.X...",
    "Handshake successful.",
    "Loading weights from ./checkpoints/v2...",
    "Optimizing kernel params...",
    "CUDA cores detected: 8940",
    "Allocating tensor memory...",
    "System health: NOMINAL",
    "Monitoring throughput...",
    "Scanning for anomalies...",
    "Inference latency: 12ms",
    "Update available: patch-4.5.2",
    "Garbage collection initiated...",
    "Neural network stabilized.",
];

pub struct TelemetryFeed {
    lines: VecDeque<String>,
    rng: StdRng,
}

impl TelemetryFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            lines: VecDeque::with_capacity(MAX_LINES),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Append one random timestamped line, dropping the oldest past the cap.
    pub fn tick(&mut self) {
        let text = LINES.choose(&mut self.rng).copied().unwrap_or(LINES[0]);
        let stamp = Local::now().format("%H:%M:%S");
        self.lines.push_back(format!("[{}] {}", stamp, text));
        while self.lines.len() > MAX_LINES {
            self.lines.pop_front();
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}
