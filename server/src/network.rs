//! UDP transport: a receive task, a send task and a timeout-checker task
//! communicate with the driver loop over `mpsc` channels, the same
//! three-task split the teacher uses (`spawn_network_receiver` /
//! `spawn_network_sender` / `spawn_timeout_checker`). The driver loop here
//! owns a [`Matchmaker`] instead of a single `GameState`, since many
//! independent matches run concurrently rather than one global simulation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

use shared::{ClientInput, Packet, FIXED_STEP_MS};

use crate::config::Config;
use crate::gateway;
use crate::matchmaker::Matchmaker;
use crate::metrics::{LoggingMetricsSink, Metrics};

/// A session that has sent nothing at all — not even a `Ping` — for this
/// long is considered hard-disconnected, independent of the input-specific
/// AFK timer a match runs for players who joined but stopped moving.
const SESSION_TIMEOUT: Duration = Duration::from_secs(10);
const RECV_BUFFER_SIZE: usize = 2048;

enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    SessionTimeout { addr: SocketAddr },
}


pub struct Server {
    socket: Arc<UdpSocket>,
    matchmaker: Matchmaker,
    metrics: Metrics,
    last_seen: Arc<RwLock<HashMap<SocketAddr, Instant>>>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<(SocketAddr, Packet)>,
    outbound_rx: Option<mpsc::UnboundedReceiver<(SocketAddr, Packet)>>,
}

impl Server {
    pub async fn bind(config: &Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let socket = UdpSocket::bind(&config.bind_addr).await?;
        log::info!("listening on {}", config.bind_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket: Arc::new(socket),
            matchmaker: Matchmaker::new(config.valid_regions.clone(), config.max_players_per_match),
            metrics: Metrics::new(today_as_iso_date()),
            last_seen: Arc::new(RwLock::new(HashMap::new())),
            server_tx,
            server_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    /// The address this server actually bound to. Useful in tests that bind
    /// to port 0 and need to learn the assigned port.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let tx = self.server_tx.clone();
        let last_seen = Arc::clone(&self.last_seen);
        tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];
            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match bincode::deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            last_seen.write().await.insert(addr, Instant::now());
                            if tx.send(ServerMessage::PacketReceived { packet, addr }).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("failed to deserialize packet from {addr}: {e}"),
                    },
                    Err(e) => {
                        warn!("udp recv error: {e}");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut outbound_rx = self.outbound_rx.take().expect("sender already spawned");
        tokio::spawn(async move {
            while let Some((addr, packet)) = outbound_rx.recv().await {
                match bincode::serialize(&packet) {
                    Ok(bytes) => {
                        if let Err(e) = socket.send_to(&bytes, addr).await {
                            warn!("udp send error to {addr}: {e}");
                        }
                    }
                    Err(e) => warn!("failed to serialize outbound packet: {e}"),
                }
            }
        });
    }

    fn spawn_timeout_checker(&self) {
        let last_seen = Arc::clone(&self.last_seen);
        let tx = self.server_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let now = Instant::now();
                let timed_out: Vec<SocketAddr> = {
                    let guard = last_seen.read().await;
                    guard
                        .iter()
                        .filter(|(_, seen)| now.duration_since(**seen) > SESSION_TIMEOUT)
                        .map(|(addr, _)| *addr)
                        .collect()
                };
                if timed_out.is_empty() {
                    continue;
                }
                let mut guard = last_seen.write().await;
                for addr in timed_out {
                    guard.remove(&addr);
                    if tx.send(ServerMessage::SessionTimeout { addr }).is_err() {
                        return;
                    }
                }
            }
        });
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::JoinQueue { region, name, player_match_id } => {
                let reply = gateway::handle_join_queue(&mut self.matchmaker, addr, region, name, player_match_id);
                if matches!(reply, Packet::Error { .. }) {
                    self.metrics.record_error();
                } else {
                    self.metrics.record_connect(self.matchmaker.match_count() as u32);
                }
                self.send(addr, reply);
            }
            Packet::PlayerInput { tick, vector } => {
                self.matchmaker.handle_player_input(addr, ClientInput { tick, vector });
            }
            Packet::ProjectileHit { enemy_id, projectile_id } => {
                self.matchmaker.handle_projectile_hit(addr, &enemy_id, &projectile_id);
            }
            Packet::ToggleBystander => {
                self.matchmaker.handle_toggle_bystander(addr);
            }
            Packet::Ping { nonce } => {
                self.send(addr, Packet::Pong { server_time: now_millis(), nonce });
            }
            other => {
                debug!("ignoring unexpected client->server packet shape: {other:?}");
            }
        }
    }

    fn send(&self, addr: SocketAddr, packet: Packet) {
        let _ = self.outbound_tx.send((addr, packet));
    }

    /// Marks the next broadcast as carrying `showIsLive`. Exposed for the
    /// (out-of-scope) HTTP surface's `POST /api/live` to call into.
    pub fn trigger_show_is_live(&mut self) {
        self.matchmaker.trigger_show_is_live();
    }

    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = tokio::time::interval(Duration::from_millis(FIXED_STEP_MS as u64));
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        }
                        Some(ServerMessage::SessionTimeout { addr }) => {
                            gateway::handle_session_disconnect(&mut self.matchmaker, addr);
                            self.metrics.record_disconnect(true);
                        }
                        None => break,
                    }
                }
                _ = tick_interval.tick() => {
                    let start = Instant::now();
                    let outbound = self.matchmaker.drive();
                    self.metrics.record_loop_duration(start.elapsed());
                    for (addr, packet) in outbound {
                        self.send(addr, packet);
                    }
                    ticks += 1;
                    if ticks % 300 == 0 {
                        let stats = self.metrics.ten_second_stats();
                        debug!("driver alive: {} matches, avg loop {:.2}ms", self.matchmaker.match_count(), stats.avg_loop_ms);
                        for alert in self.metrics.check_thresholds() {
                            warn!("metrics threshold crossed: {alert:?}");
                        }
                    }
                }
            }
        }

        self.matchmaker.shutdown();
        self.metrics.roll_up_day(today_as_iso_date(), &LoggingMetricsSink);
        Ok(())
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Civil-from-days (Howard Hinnant's algorithm), avoiding a chrono
/// dependency the teacher's stack doesn't carry.
fn today_as_iso_date() -> String {
    let days_since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() / 86_400)
        .unwrap_or(0);
    let z = days_since_epoch as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_as_iso_date_has_expected_shape() {
        let date = today_as_iso_date();
        let parts: Vec<&str> = date.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 4);
    }
}
