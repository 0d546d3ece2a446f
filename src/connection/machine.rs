use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use rand::Rng as _;
use tracing::{debug, warn};

use super::response::{self, ResponseKind};
use crate::policy::TransferPolicy;
use crate::source::PeerSource;
use crate::swarm::{ConnectionId, SwarmCoordinator};

/// States of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Idle, counting down to the next reconnect attempt.
    Waiting,
    /// Outbound TCP connect in flight.
    Connecting,
    /// Asked the overlay for a reverse connection from a firewalled
    /// source; only inbound sockets are accepted in this state.
    SentPush,
    /// Connected, no transfer assigned yet.
    Connected,
    /// Transferring a byte range.
    Downloading,
    /// Terminal; this source could not be used.
    CouldNotConnect,
}

/// An inclusive byte interval `[start, stop]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRange {
    pub start: u64,
    pub stop: u64,
}

impl TransferRange {
    pub fn len(&self) -> u64 {
        self.stop.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.stop < self.start
    }
}

/// A socket side effect requested by the state machine, executed by the
/// driver that owns the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a fresh outbound TCP connection.
    Connect { host: String, port: u16 },
    /// Write these bytes to the live socket.
    Send(Vec<u8>),
    /// Ask the overlay to request a reverse connection.
    RequestPush,
    /// Ask the overlay whether a queued transfer is still alive.
    QueueProbe,
}

/// Logical state of a connection that survives persistence.
///
/// Sockets, buffers, and timers are transient and always rebuilt fresh;
/// only the identity, offsets, and retry progress are worth keeping.
#[derive(Debug, Clone)]
pub struct PersistedConnection {
    pub source: PeerSource,
    pub id: ConnectionId,
    pub state: ConnectionState,
    pub start_offset: u64,
    pub cur_offset: u64,
    pub last_message: String,
}

/// One attempt to exchange bytes with one source for one logical file.
///
/// Driven by its owning [`super::ConnectionDriver`]: timer ticks and
/// socket events come in as method calls, coordinator callbacks go out
/// through the swarm back-reference, and socket work is returned as
/// [`Command`]s.
pub struct PeerConnection {
    id: ConnectionId,
    swarm: Arc<dyn SwarmCoordinator>,
    policy: Arc<TransferPolicy>,
    source: PeerSource,
    state: ConnectionState,
    retry_count: i32,
    initial_delay: Duration,
    start_offset: u64,
    cur_offset: u64,
    available_ranges: Vec<TransferRange>,
    header_buf: BytesMut,
    header_done: bool,
    last_message: String,
    quick_reconnect: bool,
    queued: bool,
    received_since_tick: bool,
    disconnect_fired: bool,
}

impl PeerConnection {
    /// Creates a connection for `source`, waiting. The first reconnect
    /// tick fires after a jittered delay sized by how many sources the
    /// swarm already knows about.
    pub fn new(
        source: PeerSource,
        id: ConnectionId,
        swarm: Arc<dyn SwarmCoordinator>,
        known_source_count: usize,
        policy: Arc<TransferPolicy>,
    ) -> Self {
        let initial_delay = policy.initial_delay(id.0, known_source_count);
        Self {
            id,
            swarm,
            policy,
            source,
            state: ConnectionState::Waiting,
            retry_count: 0,
            initial_delay,
            start_offset: 0,
            cur_offset: 0,
            available_ranges: Vec::new(),
            header_buf: BytesMut::new(),
            header_done: false,
            last_message: String::new(),
            quick_reconnect: false,
            queued: false,
            received_since_tick: false,
            disconnect_fired: false,
        }
    }

    /// Rebuilds a connection from persisted logical state.
    ///
    /// Transient resources are always fresh. A connection persisted
    /// mid-connect or as unusable goes back to `Waiting` so the source
    /// gets another chance, and the first retry uses a fixed delay
    /// instead of the construction jitter.
    pub fn rehydrate(
        persisted: PersistedConnection,
        swarm: Arc<dyn SwarmCoordinator>,
        policy: Arc<TransferPolicy>,
    ) -> Self {
        let state = match persisted.state {
            ConnectionState::Connecting | ConnectionState::CouldNotConnect => {
                ConnectionState::Waiting
            }
            other => other,
        };
        let initial_delay = policy.rehydrate_delay;
        Self {
            id: persisted.id,
            swarm,
            policy,
            source: persisted.source,
            state,
            retry_count: 0,
            initial_delay,
            start_offset: persisted.start_offset,
            cur_offset: persisted.cur_offset,
            available_ranges: Vec::new(),
            header_buf: BytesMut::new(),
            header_done: false,
            last_message: persisted.last_message,
            quick_reconnect: false,
            queued: false,
            received_since_tick: false,
            disconnect_fired: false,
        }
    }

    /// Snapshot of the logical state worth persisting.
    pub fn persist(&self) -> PersistedConnection {
        PersistedConnection {
            source: self.source.clone(),
            id: self.id,
            state: self.state,
            start_offset: self.start_offset,
            cur_offset: self.cur_offset,
            last_message: self.last_message.clone(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn source(&self) -> &PeerSource {
        &self.source
    }

    /// Last protocol-level message, for diagnostics and UI.
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn cur_offset(&self) -> u64 {
        self.cur_offset
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub(super) fn retry_count(&self) -> i32 {
        self.retry_count
    }

    /// Delay before the retry scheduler starts ticking.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    pub fn swarm_active(&self) -> bool {
        self.swarm.is_active()
    }

    /// Installs the byte ranges the remote advertised as available.
    pub fn set_available_ranges(&mut self, ranges: Vec<TransferRange>) {
        self.available_ranges = ranges;
    }

    /// Requests a quick reconnect after the next mid-transfer disconnect,
    /// instead of the full retry countdown.
    pub fn mark_quick_reconnect(&mut self) {
        self.quick_reconnect = true;
    }

    /// One tick of the retry scheduler.
    ///
    /// Counts down, then starts a connection attempt if the swarm's
    /// active-connection count leaves room under the bandwidth-class
    /// ceiling. When the ceiling would be reached the attempt is deferred
    /// by the cooldown count instead.
    pub fn on_retry_tick(&mut self) -> Option<Command> {
        if !self.swarm.is_active() {
            return None;
        }
        self.retry_count -= 1;
        if self.retry_count > 0 || self.state != ConnectionState::Waiting {
            return None;
        }

        let active = self.swarm.active_connection_count();
        if active + 1 >= self.policy.active_ceiling() {
            self.retry_count = self.policy.cooldown_count;
            debug!(
                id = %self.id,
                active,
                ceiling = self.policy.active_ceiling(),
                "admission control deferred reconnect"
            );
            return None;
        }

        self.retry_count = 0;
        self.begin_connect()
    }

    /// Starts an outbound connection attempt.
    pub fn begin_connect(&mut self) -> Option<Command> {
        if !self.swarm.is_active() {
            return None;
        }
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Downloading
        ) {
            return None;
        }

        self.disconnect_fired = false;
        self.header_buf.clear();
        self.header_done = false;
        self.state = ConnectionState::Connecting;
        debug!(id = %self.id, host = %self.source.host, port = self.source.port, "connecting");
        Some(Command::Connect {
            host: self.source.host.clone(),
            port: self.source.port,
        })
    }

    /// The outbound connect succeeded.
    pub fn on_connected(&mut self) {
        if self.state != ConnectionState::Connecting || !self.swarm.is_active() {
            return;
        }
        self.state = ConnectionState::Connected;
        self.retry_count = 0;
        self.queued = false;
        debug!(id = %self.id, host = %self.source.host, "connected");
        self.swarm.notify_available(self.id);
    }

    /// The connect watchdog fired before the connect completed.
    ///
    /// Firewalled sources get one more chance through the overlay's push
    /// mechanism; everything else becomes unusable.
    pub fn on_connect_timeout(&mut self) -> Option<Command> {
        self.disconnect("connect watchdog");
        if self.source.firewalled {
            self.state = ConnectionState::SentPush;
            debug!(id = %self.id, host = %self.source.host, "requesting push fallback");
            return Some(Command::RequestPush);
        }
        None
    }

    /// Feeds a push-delivered inbound connection.
    ///
    /// Accepted only while in `SentPush`; the caller must close the
    /// socket when this returns false. `peer_host` is the observed remote
    /// address, which corrects the source's declared one so later retries
    /// reach the true origin.
    pub fn accept_inbound(&mut self, peer_host: Option<String>) -> bool {
        if !self.swarm.is_active() {
            return false;
        }
        if self.state != ConnectionState::SentPush {
            warn!(id = %self.id, state = ?self.state, "rejected inbound connection");
            return false;
        }

        self.disconnect_fired = false;
        self.header_buf.clear();
        self.header_done = false;
        if let Some(host) = peer_host {
            self.source.host = host;
        }
        self.state = ConnectionState::Connected;
        self.retry_count = 0;
        self.queued = false;
        debug!(id = %self.id, host = %self.source.host, "accepted pushed connection");
        self.swarm.notify_available(self.id);
        true
    }

    /// Begins a `Downloading` episode for the byte range `[start, stop)`.
    ///
    /// A `stop` of zero means the end of the file. The request is fitted
    /// against the remote's advertised availability first; when no
    /// advertised segment can satisfy a useful portion of it the
    /// connection is dropped instead.
    pub fn start_transfer(&mut self, start: u64, stop: u64) -> Option<Command> {
        if self.state != ConnectionState::Connected {
            debug!(id = %self.id, state = ?self.state, "start_transfer outside Connected");
            return None;
        }

        // inclusive stop offset
        let stop = if stop == 0 {
            self.source.file_size.saturating_sub(1)
        } else {
            stop - 1
        };
        let resolved = match self.fit_range(TransferRange { start, stop }) {
            Some(range) => range,
            None => {
                debug!(id = %self.id, start, stop, "no advertised part covers range");
                self.disconnect("no part found");
                return None;
            }
        };

        self.start_offset = resolved.start;
        self.cur_offset = 0;
        self.state = ConnectionState::Downloading;

        if self.source.hash.is_none() {
            debug!(id = %self.id, "starting transfer without content hash");
        }

        Some(Command::Send(self.build_request(resolved)))
    }

    /// Fits a requested range into the remote's advertised availability.
    ///
    /// With no advertised list the request stands as-is. Otherwise the
    /// segment containing `start` decides: requests already inside it
    /// pass, requests running past it are cut back to the segment end
    /// when that still leaves a useful amount, and a request to the end
    /// of the file is allowed to run past.
    fn fit_range(&self, range: TransferRange) -> Option<TransferRange> {
        if self.available_ranges.is_empty() {
            return Some(range);
        }
        let file_end = self.source.file_size.saturating_sub(1);
        for part in &self.available_ranges {
            if range.start >= part.start && range.start < part.stop {
                if range.stop <= part.stop {
                    return Some(range);
                }
                if part.stop - range.start >= self.policy.min_segment {
                    return Some(TransferRange {
                        start: range.start,
                        stop: part.stop,
                    });
                }
                if range.stop == file_end {
                    return Some(range);
                }
                return None;
            }
        }
        None
    }

    fn build_request(&self, range: TransferRange) -> Vec<u8> {
        let identity = self
            .source
            .hash
            .as_ref()
            .map(|hash| hash.as_str())
            .unwrap_or("");
        let mut request = String::new();
        let _ = write!(request, "GET /uri-res/N2R?{} HTTP/1.1\r\n", identity);
        let _ = write!(request, "User-Agent: {}\r\n", self.policy.user_agent);
        let _ = write!(
            request,
            "Host: {}:{}\r\n",
            self.source.host, self.source.port
        );
        request.push_str("Connection: Keep-Alive\r\n");
        let _ = write!(request, "Range: bytes={}-{}\r\n", range.start, range.stop);
        request.push_str("\r\n");
        request.into_bytes()
    }

    /// Bytes arrived on the socket.
    ///
    /// Until the header terminator has been seen once per connection the
    /// bytes accumulate in handshake mode; after that everything is
    /// forwarded to the coordinator with running-offset bookkeeping.
    pub fn on_bytes(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.received_since_tick = true;
        if self.state != ConnectionState::Downloading {
            return;
        }

        if self.cur_offset == 0 && !self.header_done {
            self.header_buf.extend_from_slice(data);
            let Some(end) = response::find_header_end(&self.header_buf) else {
                return;
            };
            let header = String::from_utf8_lossy(&self.header_buf[..end]).into_owned();
            let payload = self.header_buf[end + 4..].to_vec();
            self.header_buf.clear();

            if self.source.vendor.is_empty() {
                if let Some(vendor) = response::header_value(&header, "Server") {
                    self.source.vendor = vendor;
                }
            }

            match response::classify(&header) {
                ResponseKind::Success => {
                    self.header_done = true;
                    if !payload.is_empty() {
                        self.flush(&payload);
                    }
                }
                ResponseKind::Busy { queue_position } => {
                    match queue_position {
                        Some(position) => {
                            self.last_message = format!("Queued (position {})", position);
                            self.queued = true;
                        }
                        None => self.last_message = "Server Busy".to_string(),
                    }
                    self.disconnect("server busy");
                }
                ResponseKind::NotFound => {
                    self.last_message = "File Not Found".to_string();
                    self.disconnect("file not found");
                    self.state = ConnectionState::CouldNotConnect;
                }
                ResponseKind::Unknown => {
                    self.last_message = "Unknown Error".to_string();
                    self.disconnect("unrecognized response");
                }
            }
        } else {
            self.flush(data);
        }
    }

    fn flush(&mut self, data: &[u8]) {
        let file_offset = self.start_offset + self.cur_offset;
        let mut running = self.cur_offset;
        self.swarm.flush_data(file_offset, data, self.id, &mut running);
        self.cur_offset = running;
    }

    /// One tick of the stall watchdog.
    ///
    /// A `Downloading` connection that moved no bytes since the previous
    /// tick is forcibly disconnected with the quick-reconnect countdown,
    /// so a silently dead TCP connection cannot hold a transfer slot.
    /// Queued transfers occasionally get a liveness probe, sampled rather
    /// than every tick to avoid flooding.
    pub fn on_stall_tick(&mut self) -> Option<Command> {
        if !self.swarm.is_active() {
            return None;
        }
        if self.state == ConnectionState::Downloading && !self.received_since_tick {
            self.quick_reconnect = true;
            self.disconnect("stall watchdog");
            self.received_since_tick = false;
            return None;
        }
        self.received_since_tick = false;

        if self.queued && rand::rng().random_range(0..self.policy.queue_probe_period) == 1 {
            return Some(Command::QueueProbe);
        }
        None
    }

    /// Tears down the current connection attempt.
    ///
    /// Idempotent: the timeout watchdog and a socket error can both
    /// signal a disconnect for the same attempt, and cleanup must run
    /// once. Returns whether cleanup ran, so the caller releases the
    /// socket exactly once.
    pub fn disconnect(&mut self, reason: &str) -> bool {
        if self.disconnect_fired {
            return false;
        }
        self.disconnect_fired = true;
        debug!(id = %self.id, state = ?self.state, reason, "disconnecting");

        self.header_buf.clear();
        self.header_done = false;

        match self.state {
            ConnectionState::Connected => {
                self.state = ConnectionState::Waiting;
                self.retry_count = self.policy.retry_count;
                self.reset_offsets();
            }
            ConnectionState::Connecting => {
                self.last_message.clear();
                self.state = ConnectionState::CouldNotConnect;
            }
            ConnectionState::Downloading => {
                self.state = ConnectionState::Waiting;
                self.swarm.notify_idle(self.id);
                self.retry_count = if self.quick_reconnect {
                    self.quick_reconnect = false;
                    self.policy.quick_retry_count
                } else {
                    self.policy.retry_count
                };
                self.reset_offsets();
            }
            ConnectionState::SentPush
            | ConnectionState::Waiting
            | ConnectionState::CouldNotConnect => {}
        }
        true
    }

    fn reset_offsets(&mut self) {
        self.start_offset = 0;
        self.cur_offset = 0;
    }
}
