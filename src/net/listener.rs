//! # World listener.
//!
//! [`Listener::bind`] runs during `StartingWorkers`; [`Listener::serve`] is the `Ready`
//! phase: it accepts connections until the stop token fires, hands each to the
//! [`SessionAcceptor`] on its own task, and aborts those tasks on the way out.
//!
//! ```text
//! bind(addr) ──► ListenerBound ──► serve(ctx)
//!                                    ├─► accept ─► spawn acceptor.accept(stream, peer, child ctx)
//!                                    └─► ctx cancelled ─► abort sessions, return
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};

/// Receives accepted client connections.
///
/// Session protocols live outside the supervisor; an acceptor should return once
/// `ctx` is cancelled.
#[async_trait]
pub trait SessionAcceptor: Send + Sync + 'static {
    /// Takes ownership of one connection.
    async fn accept(&self, stream: TcpStream, peer: SocketAddr, ctx: CancellationToken);
}

/// Logs and closes every connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloseSessions;

#[async_trait]
impl SessionAcceptor for CloseSessions {
    async fn accept(&self, stream: TcpStream, peer: SocketAddr, _ctx: CancellationToken) {
        debug!(%peer, "no session handler, closing connection");
        drop(stream);
    }
}

/// A bound world listener.
pub struct Listener {
    inner: TcpListener,
    local: SocketAddr,
}

impl Listener {
    /// Binds `addr` and publishes `ListenerBound`.
    pub async fn bind(addr: SocketAddr, bus: &Bus) -> Result<Self, RuntimeError> {
        let fail = |source| RuntimeError::Bind {
            addr: addr.to_string(),
            source,
        };
        let inner = TcpListener::bind(addr).await.map_err(fail)?;
        let local = inner.local_addr().map_err(fail)?;
        info!(addr = %local, "world listener bound");
        bus.publish(Event::new(EventKind::ListenerBound).with_addr(local));
        Ok(Self { inner, local })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Accept loop; returns once `ctx` is cancelled and sessions are aborted.
    pub async fn serve(self, acceptor: Arc<dyn SessionAcceptor>, ctx: CancellationToken) {
        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                accepted = self.inner.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let acceptor = acceptor.clone();
                        let child = ctx.child_token();
                        sessions.spawn(async move { acceptor.accept(stream, peer, child).await });
                    }
                    Err(e) => warn!(error = %e, "world accept failed"),
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }
        let open = sessions.len();
        sessions.shutdown().await;
        info!(addr = %self.local, aborted = open, "world listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncReadExt;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl SessionAcceptor for Counting {
        async fn accept(&self, _stream: TcpStream, _peer: SocketAddr, _ctx: CancellationToken) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn sessions_reach_the_acceptor_until_stopped() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), &bus)
            .await
            .unwrap();
        let addr = listener.local_addr();
        assert_eq!(rx.recv().await.unwrap().addr, Some(addr));

        let acceptor = Arc::new(Counting(AtomicUsize::new(0)));
        let ctx = CancellationToken::new();
        let serve = tokio::spawn(listener.serve(acceptor.clone(), ctx.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
        assert_eq!(acceptor.0.load(Ordering::SeqCst), 1);

        ctx.cancel();
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let bus = Bus::new(4);
        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), &bus)
            .await
            .unwrap();
        let err = Listener::bind(first.local_addr(), &bus).await.err().unwrap();
        assert_eq!(err.as_label(), "runtime_bind_failed");
    }
}
