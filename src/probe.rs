use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;
use tracing::trace;

/// One bounded-timeout connection attempt against a single address.
///
/// Implementations report reachability only. Errors of any kind mean "closed"
/// and are never propagated.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: SocketAddr, timeout: Duration) -> bool;
}

/// Plain TCP connect probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProbe;

#[async_trait]
impl Prober for TcpConnectProbe {
    async fn probe(&self, addr: SocketAddr, timeout: Duration) -> bool {
        probe(addr, timeout).await
    }
}

/// Attempt exactly one TCP connect to `addr`, giving up after `timeout`.
///
/// The stream is dropped before returning on every path, and dropping this future
/// mid-connect closes the pending socket.
pub async fn probe(addr: SocketAddr, timeout: Duration) -> bool {
    connect_within(addr, TcpStream::connect(addr), timeout).await
}

/// Drive one connect future under `timeout`, folding every failure into `false`.
async fn connect_within<F, S>(addr: SocketAddr, connect: F, timeout: Duration) -> bool
where
    F: Future<Output = io::Result<S>>,
{
    match time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            trace!(%addr, error = %e, "connect failed");
            false
        }
        Err(_) => {
            trace!(%addr, "connect timed out");
            false
        }
    }
}
