//! Socket-reading threads and their shutdown choreography.
//!
//! One thread per socket role (TCP accept, per-connection TCP receive, one
//! shared UDP receive), each publishing decoded events onto an unbounded
//! channel consumed by the single game-state thread. Stopping a receiver is
//! always: clear the running flag, force the blocking call to return, join.
//! Errors raised by waking an already-dead socket are accepted and ignored.

use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use super::protocol::BUFFER_SIZE;

/// Accept loop for the server's listening socket. Accepted sockets are
/// pushed with their peer address; entity creation happens on the
/// consuming thread, never here.
pub struct ConnectionListener {
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl ConnectionListener {
    pub fn spawn(
        listener: TcpListener,
        connections: Sender<(TcpStream, SocketAddr)>,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || accept_loop(listener, connections, flag));
        Ok(Self {
            running,
            local_addr,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Clear the flag, wake the blocking accept with a throwaway loopback
    /// connection, join.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = TcpStream::connect(wake_target(self.local_addr));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(
    listener: TcpListener,
    connections: Sender<(TcpStream, SocketAddr)>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if !running.load(Ordering::SeqCst) {
                    // Wake connection during shutdown.
                    break;
                }
                if connections.send((stream, peer)).is_err() {
                    break;
                }
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    log::warn!("accept failed: {e}");
                }
                break;
            }
        }
    }
}

/// Receiver thread for one TCP stream. The server flavor is one-shot: at
/// most one receive attempt, then an unconditional disconnect signal. The
/// client flavor loops until the flag is cleared or the stream dies.
pub struct TcpReceiver {
    running: Arc<AtomicBool>,
    stream: TcpStream,
    handle: Option<JoinHandle<()>>,
}

impl TcpReceiver {
    /// Server side, one attempt. The blocking read returns only once the
    /// peer sends, closes, or the socket is shut down; whichever way it
    /// returns, `peer` lands on the disconnect channel.
    pub fn spawn_one_shot(
        stream: TcpStream,
        peer: SocketAddr,
        messages: Sender<String>,
        disconnects: Sender<SocketAddr>,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread_stream = stream.try_clone()?;
        let handle = thread::spawn(move || {
            let mut stream = thread_stream;
            let mut buf = vec![0u8; BUFFER_SIZE];
            match stream.read(&mut buf) {
                Ok(n) if n > 0 => match std::str::from_utf8(&buf[..n]) {
                    Ok(text) => {
                        let _ = messages.send(text.to_string());
                    }
                    Err(_) => log::warn!("dropping non-UTF-8 message from {peer}"),
                },
                Ok(_) => {}
                Err(e) => {
                    if flag.load(Ordering::SeqCst) {
                        log::debug!("tcp receive from {peer} failed: {e}");
                    }
                }
            }
            let _ = disconnects.send(peer);
        });
        Ok(Self {
            running,
            stream,
            handle: Some(handle),
        })
    }

    /// Client side, long-lived. Each successful receive is one message;
    /// EOF or any error ends the loop.
    pub fn spawn(stream: TcpStream, messages: Sender<String>) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread_stream = stream.try_clone()?;
        let handle = thread::spawn(move || {
            let mut stream = thread_stream;
            let mut buf = vec![0u8; BUFFER_SIZE];
            while flag.load(Ordering::SeqCst) {
                match stream.read(&mut buf) {
                    Ok(n) if n > 0 => match std::str::from_utf8(&buf[..n]) {
                        Ok(text) => {
                            if messages.send(text.to_string()).is_err() {
                                break;
                            }
                        }
                        Err(_) => log::warn!("dropping non-UTF-8 message"),
                    },
                    Ok(_) => break,
                    Err(e) => {
                        if flag.load(Ordering::SeqCst) {
                            log::debug!("tcp receive failed: {e}");
                        }
                        break;
                    }
                }
            }
        });
        Ok(Self {
            running,
            stream,
            handle: Some(handle),
        })
    }

    /// Clear the flag, shut the stream down to fail the blocking read,
    /// join. Shutting down an already-closed socket is accepted.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The shared UDP receive loop. Every datagram is pushed as decoded text
/// with its source address; the consumer decides what it means.
pub struct UdpReceiver {
    running: Arc<AtomicBool>,
    socket: UdpSocket,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl UdpReceiver {
    pub fn spawn(socket: UdpSocket, updates: Sender<(SocketAddr, String)>) -> io::Result<Self> {
        let local_addr = socket.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread_socket = socket.try_clone()?;
        let handle = thread::spawn(move || {
            let mut buf = vec![0u8; BUFFER_SIZE];
            loop {
                match thread_socket.recv_from(&mut buf) {
                    Ok((n, peer)) => {
                        if !flag.load(Ordering::SeqCst) {
                            break;
                        }
                        match std::str::from_utf8(&buf[..n]) {
                            Ok(text) => {
                                if updates.send((peer, text.to_string())).is_err() {
                                    break;
                                }
                            }
                            Err(_) => log::warn!("dropping non-UTF-8 datagram from {peer}"),
                        }
                    }
                    Err(e) => {
                        if flag.load(Ordering::SeqCst) {
                            log::warn!("udp receive failed: {e}");
                        }
                        break;
                    }
                }
            }
        });
        Ok(Self {
            running,
            socket,
            local_addr,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Clear the flag, wake the blocking `recv_from` with an empty
    /// datagram to the socket's own address, join.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.socket.send_to(&[], wake_target(self.local_addr));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A socket bound to the wildcard address cannot be woken by sending to it
/// verbatim; route the wake through loopback instead.
fn wake_target(local: SocketAddr) -> SocketAddr {
    if local.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
    } else {
        local
    }
}
