//! Ingress listener
//!
//! Owns the single local-facing UDP socket that clients send to and that
//! reverse tasks answer through.

use crate::error::RelayError;
use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// The local-facing datagram socket shared by the dispatch loop and all
/// reverse-forwarding tasks.
///
/// `tokio::net::UdpSocket` takes `&self` for both `recv_from` and `send_to`,
/// so many reverse tasks may send while the dispatch loop is blocked on a
/// receive without additional locking.
pub struct IngressListener {
    /// The shared local-facing socket
    socket: UdpSocket,
}

impl IngressListener {
    /// Bind the listener to `0.0.0.0:<port>` with address reuse enabled
    ///
    /// Port 0 binds an ephemeral port; the effective address is available
    /// through [`local_addr`](Self::local_addr).
    pub fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .with_context(|| "Failed to create ingress socket")?;
        socket
            .set_reuse_address(true)
            .with_context(|| "Failed to set SO_REUSEADDR on ingress socket")?;
        socket
            .bind(&addr.into())
            .map_err(|e| RelayError::Bind(format!("{}: {}", addr, e)))?;
        socket
            .set_nonblocking(true)
            .with_context(|| "Failed to set ingress socket nonblocking")?;

        let socket = UdpSocket::from_std(socket.into())
            .with_context(|| "Failed to register ingress socket with the runtime")?;

        Ok(IngressListener { socket })
    }

    /// Receive one datagram, returning its length and the sender identity
    ///
    /// Datagrams larger than `buf` are truncated per platform UDP semantics.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Send a payload back to a client identity
    pub async fn send_to(&self, buf: &[u8], client: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, client).await
    }

    /// Get the bound local address
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = IngressListener::bind(0).unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.port() > 0);
        assert_eq!(addr.ip(), Ipv4Addr::UNSPECIFIED);
    }

    #[tokio::test]
    async fn test_recv_and_send() {
        let listener = IngressListener::bind(0).unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"ping", ("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, client.local_addr().unwrap());

        listener.send_to(b"pong", from).await.unwrap();
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"pong");
    }

    #[tokio::test]
    async fn test_truncation_on_small_buffer() {
        let listener = IngressListener::bind(0).unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(&[0xAB; 128], ("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 16);
        assert_eq!(buf, [0xAB; 16]);
    }
}
