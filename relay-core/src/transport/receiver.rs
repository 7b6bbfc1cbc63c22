//! Transport ingress: accepts one TCP client and produces fixed-size PCM
//! frames.
//!
//! Grounded directly on `connections/socket_receiver.py`: `SO_REUSEADDR`,
//! `listen(1)`, a single `accept()`, and `receive_full_chunk`'s
//! read-until-full-or-closed loop.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::error::{RelayError, Result};
use crate::model::Frame;
use crate::net::read_full_chunk;
use crate::stage::{Message, SourceStage};

pub struct SocketReceiver {
    addr: SocketAddr,
    chunk_size: usize,
}

impl SocketReceiver {
    pub fn new(addr: SocketAddr, chunk_size: usize) -> Self {
        Self { addr, chunk_size }
    }

    /// Binds and listens, returning the bound listener so the caller can
    /// learn the actual port before accepting (useful when `addr`'s port is
    /// 0, e.g. in tests). Mirrors `socket.setsockopt(SO_REUSEADDR)` +
    /// `listen(1)` from the Python original; `TcpListener::bind` on most
    /// platforms already sets `SO_REUSEADDR` by default.
    pub fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.addr).map_err(|source| RelayError::Bind {
            addr: self.addr,
            source,
        })
    }
}

impl SocketReceiver {
    /// Runs against an already-bound listener, skipping the internal bind.
    /// Lets callers (and tests) learn the actual port before a client
    /// connects, which matters when `addr`'s port is 0.
    pub fn run_with_listener(
        self,
        listener: TcpListener,
        output: Sender<Message<Frame>>,
        stop_flag: Arc<AtomicBool>,
    ) {
        tracing::info!(stage = self.name(), addr = %self.addr, "waiting for client");
        let mut conn = match listener.accept() {
            Ok((conn, peer)) => {
                tracing::info!(stage = self.name(), %peer, "client connected");
                conn
            }
            Err(source) => {
                let err = RelayError::Accept(source);
                tracing::error!(stage = self.name(), %err, "accept failed");
                let _ = output.send(Message::Shutdown);
                return;
            }
        };

        loop {
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }
            match read_full_chunk(&mut conn, self.chunk_size) {
                Ok(Some(bytes)) => {
                    if output.send(Message::Item(Frame::new(bytes))).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(stage = self.name(), "connection closed by peer");
                    break;
                }
                Err(err) => {
                    tracing::warn!(stage = self.name(), ?err, "read failed, treating as end of stream");
                    break;
                }
            }
        }

        let _ = output.send(Message::Shutdown);
        tracing::info!(stage = self.name(), "receiver closed");
    }
}

impl SourceStage for SocketReceiver {
    type Output = Frame;

    fn name(&self) -> &str {
        "socket-receiver"
    }

    fn run(self: Box<Self>, output: Sender<Message<Frame>>, stop_flag: Arc<AtomicBool>) {
        let listener = match self.bind() {
            Ok(l) => l,
            Err(err) => {
                tracing::error!(stage = self.name(), ?err, "bind failed");
                let _ = output.send(Message::Shutdown);
                return;
            }
        };
        (*self).run_with_listener(listener, output, stop_flag);
    }
}
