//! Blocking read-until-full / write-all primitives shared by the transport
//! ingress and egress stages.

use std::io::{Read, Write};
use std::net::TcpStream;

/// Reads exactly `len` bytes from `conn`, looping on short reads. Returns
/// `Ok(None)` if the peer closed the connection before `len` bytes arrived
/// (mirrors the Python original's `receive_full_chunk`, which returns `None`
/// on a zero-length `recv`).
pub fn read_full_chunk(conn: &mut TcpStream, len: usize) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = conn.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(None);
        }
        filled += n;
    }
    Ok(Some(buf))
}

/// Writes the entire buffer to `conn`, looping until it is all sent.
/// Equivalent to `TcpStream::write_all`, named separately to give transport
/// failures a single call site to classify.
pub fn write_all_chunk(conn: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    conn.write_all(data)
}

/// True if `err` represents the peer having gone away (broken pipe or
/// connection reset) — the condition under which `SocketSender` exits
/// silently rather than logging an error.
pub fn is_peer_gone(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
    )
}
