use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior, Sleep};
use tracing::debug;

use super::error::ConnectionError;
use super::machine::{Command, ConnectionState, PeerConnection};
use crate::overlay::Overlay;

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

enum Request {
    StartTransfer { start: u64, stop: u64 },
    AcceptInbound(TcpStream),
    Disconnect(String),
    Shutdown,
}

/// Handle through which a coordinator drives a spawned connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Request>,
}

impl ConnectionHandle {
    /// Assigns a byte range and starts a `Downloading` episode.
    pub async fn start_transfer(&self, start: u64, stop: u64) -> Result<(), ConnectionError> {
        self.tx
            .send(Request::StartTransfer { start, stop })
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Feeds a push-delivered inbound socket. Rejected (and closed)
    /// unless the connection is waiting in `SentPush`.
    pub async fn accept_inbound(&self, stream: TcpStream) -> Result<(), ConnectionError> {
        self.tx
            .send(Request::AcceptInbound(stream))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Tears down the current attempt; the connection re-enters its
    /// normal retry cycle.
    pub async fn disconnect(&self, reason: impl Into<String>) -> Result<(), ConnectionError> {
        self.tx
            .send(Request::Disconnect(reason.into()))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Stops the driver task: timers stop, the socket closes, no further
    /// callbacks fire.
    pub async fn shutdown(&self) -> Result<(), ConnectionError> {
        self.tx
            .send(Request::Shutdown)
            .await
            .map_err(|_| ConnectionError::Closed)
    }
}

/// Owns one connection's socket, timers, and control channel.
///
/// The driver is the only holder of the socket; the state machine sees it
/// purely through events and [`Command`]s. Dropping out of the loop (a
/// shutdown request, or the swarm going inactive) releases everything.
pub struct ConnectionDriver;

impl ConnectionDriver {
    /// Spawns the driver task for a connection and returns its handle.
    pub fn spawn(machine: PeerConnection, overlay: Arc<dyn Overlay>) -> ConnectionHandle {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(drive(machine, overlay, rx));
        ConnectionHandle { tx }
    }
}

fn socket_live(state: ConnectionState) -> bool {
    matches!(
        state,
        ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Downloading
    )
}

async fn drive(
    mut machine: PeerConnection,
    overlay: Arc<dyn Overlay>,
    mut rx: mpsc::Receiver<Request>,
) {
    let retry_tick = machine.policy().retry_tick;
    let stall_interval = machine.policy().stall_interval;
    let connect_timeout = machine.policy().connect_timeout;
    let recv_buffer_size = machine.policy().recv_buffer_size;

    // jittered first retry window; ticks are uniform afterwards
    sleep(machine.initial_delay()).await;

    let mut retry = interval(retry_tick);
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stall = interval(stall_interval);
    stall.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut stream: Option<TcpStream> = None;
    let mut connect_fut: Option<ConnectFuture> = None;
    let mut connect_deadline: Option<Pin<Box<Sleep>>> = None;
    let mut read_buf = BytesMut::zeroed(recv_buffer_size);

    loop {
        tokio::select! {
            request = rx.recv() => {
                match request {
                    Some(Request::StartTransfer { start, stop }) => {
                        if let Some(Command::Send(data)) = machine.start_transfer(start, stop) {
                            let sent = match stream.as_mut() {
                                Some(socket) => socket.write_all(&data).await.is_ok(),
                                None => false,
                            };
                            if !sent {
                                machine.disconnect("send failed");
                            }
                        }
                    }
                    Some(Request::AcceptInbound(socket)) => {
                        let peer_host = socket.peer_addr().ok().map(|addr| addr.ip().to_string());
                        if machine.accept_inbound(peer_host) {
                            connect_fut = None;
                            connect_deadline = None;
                            stream = Some(socket);
                        }
                        // rejected sockets drop here, which closes them
                    }
                    Some(Request::Disconnect(reason)) => {
                        machine.disconnect(&reason);
                    }
                    Some(Request::Shutdown) | None => break,
                }
            }

            _ = retry.tick() => {
                if !machine.swarm_active() {
                    break;
                }
                if let Some(Command::Connect { host, port }) = machine.on_retry_tick() {
                    stream = None;
                    connect_fut = Some(Box::pin(TcpStream::connect((host, port))));
                    connect_deadline = Some(Box::pin(sleep(connect_timeout)));
                }
            }

            _ = stall.tick() => {
                if !machine.swarm_active() {
                    break;
                }
                if let Some(Command::QueueProbe) = machine.on_stall_tick() {
                    overlay.queue_probe(machine.source());
                }
            }

            result = async { connect_fut.as_mut().unwrap().await }, if connect_fut.is_some() => {
                connect_fut = None;
                match result {
                    Ok(socket) => {
                        connect_deadline = None;
                        stream = Some(socket);
                        machine.on_connected();
                    }
                    Err(error) => {
                        debug!(%error, "connect failed");
                        machine.disconnect("connect failed");
                    }
                }
            }

            _ = async { connect_deadline.as_mut().unwrap().await }, if connect_deadline.is_some() => {
                connect_fut = None;
                connect_deadline = None;
                if let Some(Command::RequestPush) = machine.on_connect_timeout() {
                    overlay.request_push(machine.source());
                }
            }

            result = async { stream.as_mut().unwrap().read(&mut read_buf).await }, if stream.is_some() => {
                match result {
                    Ok(0) => {
                        machine.disconnect("connection closed");
                    }
                    Ok(n) => machine.on_bytes(&read_buf[..n]),
                    Err(error) => {
                        debug!(%error, "receive failed");
                        machine.disconnect("receive failed");
                    }
                }
            }
        }

        // a disconnect anywhere above releases the socket here, once
        if !socket_live(machine.state()) {
            stream = None;
            connect_fut = None;
            connect_deadline = None;
        }
    }
}
