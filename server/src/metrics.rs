//! Rolling-window metrics aggregator: loop timing, broadcast bandwidth,
//! connection churn, threshold alerting, and the daily rollup persisted
//! through an injected sink. Grounded on the teacher's habit of wrapping
//! shared mutable state in `Arc<RwLock<_>>` (`ClientManager` in
//! `server/src/network.rs`) — the same wrapper is used here so the metrics
//! aggregator can be read from the driver loop and the (out-of-scope) HTTP
//! surface alike.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const WINDOW_10S: Duration = Duration::from_secs(10);
const WINDOW_60S: Duration = Duration::from_secs(60);

const MAX_LOOP_MS: f64 = 50.0;
const MIN_LOOPS_PER_SEC: f64 = 25.0;
const MAX_BANDWIDTH_MBPS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    SlowLoop { avg_ms: f64 },
    LowThroughput { loops_per_sec: f64 },
    HighBandwidth { mbps: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenSecondStats {
    pub avg_loop_ms: f64,
    pub max_loop_ms: f64,
    pub loops_per_sec: f64,
    pub broadcasts_per_sec: f64,
    pub avg_broadcast_kb: f64,
    pub bandwidth_mbps: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SixtySecondStats {
    pub connections: u32,
    pub disconnects: u32,
    pub reconnects: u32,
    pub slow_loop_count: u32,
    pub error_count: u32,
}

/// The document persisted at local midnight. Matches spec §6.4 exactly;
/// the server never reads it back, it only produces and hands it off.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRollup {
    pub date: String,
    pub total_players_connected: u64,
    pub peak_concurrent_players: u32,
    pub avg_concurrent_players: f64,
    pub total_rounds_played: u64,
    pub total_disconnects: u64,
    pub temporary_disconnects: u64,
    pub reconnects: u64,
    pub reconnect_rate: f64,
    pub slow_loops_count: u64,
    pub error_count: u64,
    pub peak_memory_usage_mb: f64,
    pub peak_bandwidth_mb_per_sec: f64,
}

/// The external persistence boundary for daily rollups (spec §6.2/§6.4
/// treats this as out of scope). The default implementation just logs —
/// no database crate is introduced since none of this lives in the core.
pub trait MetricsSink: Send + Sync {
    fn persist_daily_rollup(&self, rollup: &DailyRollup) -> Result<(), String>;
}

pub struct LoggingMetricsSink;

impl MetricsSink for LoggingMetricsSink {
    fn persist_daily_rollup(&self, rollup: &DailyRollup) -> Result<(), String> {
        log::info!("daily rollup for {}: {:?}", rollup.date, rollup);
        Ok(())
    }
}

#[derive(Default)]
struct DailyAccumulator {
    total_players_connected: u64,
    peak_concurrent_players: u32,
    rounds_played: u64,
    total_disconnects: u64,
    temporary_disconnects: u64,
    reconnects: u64,
    slow_loops: u64,
    errors: u64,
    peak_memory_mb: f64,
    peak_bandwidth_mbps: f64,
}

pub struct Metrics {
    loop_durations: VecDeque<(Instant, Duration)>,
    broadcasts: VecDeque<(Instant, usize)>,
    connections: VecDeque<Instant>,
    disconnects: VecDeque<Instant>,
    reconnects: VecDeque<Instant>,
    errors: VecDeque<Instant>,
    new_rounds: VecDeque<Instant>,
    daily: DailyAccumulator,
    current_date: String,
}

impl Metrics {
    pub fn new(current_date: String) -> Self {
        Metrics {
            loop_durations: VecDeque::new(),
            broadcasts: VecDeque::new(),
            connections: VecDeque::new(),
            disconnects: VecDeque::new(),
            reconnects: VecDeque::new(),
            errors: VecDeque::new(),
            new_rounds: VecDeque::new(),
            daily: DailyAccumulator::default(),
            current_date,
        }
    }

    pub fn record_loop_duration(&mut self, duration: Duration) {
        let now = Instant::now();
        self.loop_durations.push_back((now, duration));
        prune(&mut self.loop_durations, now, WINDOW_10S);
    }

    pub fn record_broadcast(&mut self, bytes: usize) {
        let now = Instant::now();
        self.broadcasts.push_back((now, bytes));
        prune(&mut self.broadcasts, now, WINDOW_10S);
    }

    pub fn record_connect(&mut self, concurrent_players: u32) {
        let now = Instant::now();
        self.connections.push_back(now);
        prune_timestamps(&mut self.connections, now, WINDOW_60S);
        self.daily.total_players_connected += 1;
        self.daily.peak_concurrent_players = self.daily.peak_concurrent_players.max(concurrent_players);
    }

    pub fn record_disconnect(&mut self, temporary: bool) {
        let now = Instant::now();
        self.disconnects.push_back(now);
        prune_timestamps(&mut self.disconnects, now, WINDOW_60S);
        self.daily.total_disconnects += 1;
        if temporary {
            self.daily.temporary_disconnects += 1;
        }
    }

    pub fn record_reconnect(&mut self) {
        let now = Instant::now();
        self.reconnects.push_back(now);
        prune_timestamps(&mut self.reconnects, now, WINDOW_60S);
        self.daily.reconnects += 1;
    }

    pub fn record_error(&mut self) {
        let now = Instant::now();
        self.errors.push_back(now);
        prune_timestamps(&mut self.errors, now, WINDOW_60S);
        self.daily.errors += 1;
    }

    pub fn record_new_round(&mut self) {
        self.new_rounds.push_back(Instant::now());
        self.daily.rounds_played += 1;
    }

    pub fn ten_second_stats(&mut self) -> TenSecondStats {
        let now = Instant::now();
        prune(&mut self.loop_durations, now, WINDOW_10S);
        prune(&mut self.broadcasts, now, WINDOW_10S);

        let loop_count = self.loop_durations.len();
        let (sum_ms, max_ms) = self.loop_durations.iter().fold((0.0, 0.0), |(sum, max), (_, d)| {
            let ms = d.as_secs_f64() * 1000.0;
            (sum + ms, f64::max(max, ms))
        });
        let avg_loop_ms = if loop_count > 0 { sum_ms / loop_count as f64 } else { 0.0 };
        let loops_per_sec = loop_count as f64 / WINDOW_10S.as_secs_f64();

        let broadcast_count = self.broadcasts.len();
        let total_bytes: usize = self.broadcasts.iter().map(|(_, b)| *b).sum();
        let avg_broadcast_kb = if broadcast_count > 0 {
            (total_bytes as f64 / broadcast_count as f64) / 1024.0
        } else {
            0.0
        };
        let bandwidth_mbps = (total_bytes as f64 * 8.0 / 1_000_000.0) / WINDOW_10S.as_secs_f64();
        self.daily.peak_bandwidth_mbps = self.daily.peak_bandwidth_mbps.max(bandwidth_mbps);

        TenSecondStats {
            avg_loop_ms,
            max_loop_ms: max_ms,
            loops_per_sec,
            broadcasts_per_sec: broadcast_count as f64 / WINDOW_10S.as_secs_f64(),
            avg_broadcast_kb,
            bandwidth_mbps,
        }
    }

    pub fn sixty_second_stats(&mut self) -> SixtySecondStats {
        let now = Instant::now();
        prune_timestamps(&mut self.connections, now, WINDOW_60S);
        prune_timestamps(&mut self.disconnects, now, WINDOW_60S);
        prune_timestamps(&mut self.reconnects, now, WINDOW_60S);
        prune_timestamps(&mut self.errors, now, WINDOW_60S);

        let slow_loop_count =
            self.loop_durations.iter().filter(|(_, d)| d.as_secs_f64() * 1000.0 > MAX_LOOP_MS).count() as u32;
        self.daily.slow_loops += slow_loop_count as u64;

        SixtySecondStats {
            connections: self.connections.len() as u32,
            disconnects: self.disconnects.len() as u32,
            reconnects: self.reconnects.len() as u32,
            slow_loop_count,
            error_count: self.errors.len() as u32,
        }
    }

    pub fn check_thresholds(&mut self) -> Vec<Alert> {
        let stats = self.ten_second_stats();
        let mut alerts = Vec::new();
        if stats.avg_loop_ms > MAX_LOOP_MS {
            alerts.push(Alert::SlowLoop { avg_ms: stats.avg_loop_ms });
        }
        if stats.loops_per_sec > 0.0 && stats.loops_per_sec < MIN_LOOPS_PER_SEC {
            alerts.push(Alert::LowThroughput { loops_per_sec: stats.loops_per_sec });
        }
        if stats.bandwidth_mbps > MAX_BANDWIDTH_MBPS {
            alerts.push(Alert::HighBandwidth { mbps: stats.bandwidth_mbps });
        }
        alerts
    }

    /// Builds and hands off the daily rollup, then resets the daily
    /// counters. Called by the process driving the clock (out of scope
    /// here) once per local midnight.
    pub fn roll_up_day(&mut self, new_date: String, sink: &dyn MetricsSink) {
        let rollup = DailyRollup {
            date: std::mem::replace(&mut self.current_date, new_date),
            total_players_connected: self.daily.total_players_connected,
            peak_concurrent_players: self.daily.peak_concurrent_players,
            avg_concurrent_players: 0.0,
            total_rounds_played: self.daily.rounds_played,
            total_disconnects: self.daily.total_disconnects,
            temporary_disconnects: self.daily.temporary_disconnects,
            reconnects: self.daily.reconnects,
            reconnect_rate: if self.daily.total_disconnects > 0 {
                self.daily.reconnects as f64 / self.daily.total_disconnects as f64
            } else {
                0.0
            },
            slow_loops_count: self.daily.slow_loops,
            error_count: self.daily.errors,
            peak_memory_usage_mb: self.daily.peak_memory_mb,
            peak_bandwidth_mb_per_sec: self.daily.peak_bandwidth_mbps,
        };
        if sink.persist_daily_rollup(&rollup).is_ok() {
            self.daily = DailyAccumulator::default();
        }
    }
}

fn prune<T>(queue: &mut VecDeque<(Instant, T)>, now: Instant, window: Duration) {
    while let Some((t, _)) = queue.front() {
        if now.duration_since(*t) > window {
            queue.pop_front();
        } else {
            break;
        }
    }
}

fn prune_timestamps(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(t) = queue.front() {
        if now.duration_since(*t) > window {
            queue.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_second_stats_average_loop_time() {
        let mut m = Metrics::new("2026-08-01".to_string());
        m.record_loop_duration(Duration::from_millis(10));
        m.record_loop_duration(Duration::from_millis(20));
        let stats = m.ten_second_stats();
        assert_eq!(stats.avg_loop_ms, 15.0);
        assert_eq!(stats.max_loop_ms, 20.0);
    }

    #[test]
    fn slow_loop_triggers_alert() {
        let mut m = Metrics::new("2026-08-01".to_string());
        for _ in 0..5 {
            m.record_loop_duration(Duration::from_millis(200));
        }
        let alerts = m.check_thresholds();
        assert!(alerts.iter().any(|a| matches!(a, Alert::SlowLoop { .. })));
    }

    #[test]
    fn daily_rollup_resets_counters_on_success() {
        let mut m = Metrics::new("2026-08-01".to_string());
        m.record_connect(3);
        m.record_disconnect(true);
        m.roll_up_day("2026-08-02".to_string(), &LoggingMetricsSink);
        assert_eq!(m.daily.total_players_connected, 0);
        assert_eq!(m.current_date, "2026-08-02");
    }

    #[test]
    fn connection_window_counts_recent_events() {
        let mut m = Metrics::new("2026-08-01".to_string());
        m.record_connect(1);
        m.record_connect(2);
        let stats = m.sixty_second_stats();
        assert_eq!(stats.connections, 2);
    }
}
