//! Transport egress: accepts one TCP client and writes fixed-size PCM
//! frames to it.
//!
//! Grounded directly on `connections/socket_sender.py`: bind/listen/accept,
//! blocking-take from the queue, `sendall`, and a silent exit on broken
//! pipe / connection reset.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::error::{RelayError, Result};
use crate::model::Frame;
use crate::net::{is_peer_gone, write_all_chunk};
use crate::stage::{Message, SinkStage};

pub struct SocketSender {
    addr: SocketAddr,
}

impl SocketSender {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.addr).map_err(|source| RelayError::Bind {
            addr: self.addr,
            source,
        })
    }

    pub fn run_with_listener(
        self,
        listener: TcpListener,
        input: Receiver<Message<Frame>>,
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
                return;
            }
        };

        loop {
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }
            match input.recv() {
                Ok(Message::Shutdown) => break,
                Ok(Message::Item(frame)) => {
                    if let Err(err) = write_all_chunk(&mut conn, frame.as_bytes()) {
                        if is_peer_gone(&err) {
                            tracing::info!(stage = self.name(), "peer gone, closing silently");
                        } else {
                            tracing::warn!(stage = self.name(), ?err, "write failed");
                        }
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        tracing::info!(stage = self.name(), "sender closed");
        // conn and listener drop here, closing both sockets
    }
}

impl SinkStage for SocketSender {
    type Input = Frame;

    fn name(&self) -> &str {
        "socket-sender"
    }

    fn run(self: Box<Self>, input: Receiver<Message<Frame>>, stop_flag: Arc<AtomicBool>) {
        let listener = match self.bind() {
            Ok(l) => l,
            Err(err) => {
                tracing::error!(stage = self.name(), ?err, "bind failed");
                return;
            }
        };
        (*self).run_with_listener(listener, input, stop_flag);
    }
}
