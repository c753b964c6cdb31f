//! # Remote administration listener.
//!
//! Line-oriented TCP console. The first line of a connection must be the shared
//! secret; every later line becomes a [`CommandRequest`] issued by
//! [`SessionId::Remote`], and its output and completion are written back on the socket.
//!
//! ```text
//! accept ──► "Authentication required." ──► secret? ─no─► "Authentication failed." close
//!                                              └─yes─► loop: line ─► enqueue ─► wait reply ─► prompt
//! ```
//!
//! Lines are capped at 4096 bytes; a longer one closes the connection.
//! An empty secret refuses to start the listener. Connections are aborted when the
//! listener stops.

use std::net::SocketAddr;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commands::{CommandQueue, CommandRequest, SessionId};
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind};
use crate::workers::{BoxWorkerFuture, Worker, REMOTE_ADMIN};

const PROMPT: &str = "mangos>";
/// Longest accepted line, secret included.
const MAX_LINE: usize = 4096;

type Lines = FramedRead<OwnedReadHalf, LinesCodec>;

/// Next line; an over-long line is an error that ends the session.
async fn next_line(lines: &mut Lines) -> std::io::Result<Option<String>> {
    match lines.next().await {
        None => Ok(None),
        Some(Ok(line)) => Ok(Some(line)),
        Some(Err(LinesCodecError::Io(e))) => Err(e),
        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("line longer than {MAX_LINE} bytes"),
        )),
    }
}

enum Reply {
    Output(String),
    Done(bool),
}

/// The remote administration worker.
pub struct RemoteAdmin {
    addr: SocketAddr,
    secret: String,
    queue: CommandQueue,
    bus: Bus,
}

impl RemoteAdmin {
    /// Listener on `addr` accepting sessions that present `secret`.
    pub fn new(
        addr: SocketAddr,
        secret: impl Into<String>,
        queue: CommandQueue,
        bus: Bus,
    ) -> Self {
        Self {
            addr,
            secret: secret.into(),
            queue,
            bus,
        }
    }

    async fn serve(self, ctx: CancellationToken) -> Result<(), WorkerError> {
        if self.secret.is_empty() {
            error!("remote admin secret is empty, listener not started");
            return Ok(());
        }
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| WorkerError::Fail {
                error: format!("cannot bind remote admin on {}: {e}", self.addr),
            })?;
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "remote admin listening");
            self.bus.publish(
                Event::new(EventKind::ListenerBound)
                    .with_worker(REMOTE_ADMIN)
                    .with_addr(local),
            );
        }

        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "remote admin connection");
                        let session = Session {
                            peer,
                            secret: self.secret.clone(),
                            queue: self.queue.clone(),
                        };
                        sessions.spawn(session.run(stream, ctx.child_token()));
                    }
                    Err(e) => warn!(error = %e, "remote admin accept failed"),
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }
        sessions.shutdown().await;
        Ok(())
    }
}

impl Worker for RemoteAdmin {
    fn name(&self) -> &str {
        REMOTE_ADMIN
    }

    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxWorkerFuture {
        Box::pin(self.serve(ctx))
    }
}

struct Session {
    peer: SocketAddr,
    secret: String,
    queue: CommandQueue,
}

impl Session {
    async fn run(self, stream: TcpStream, ctx: CancellationToken) {
        let peer = self.peer;
        tokio::select! {
            _ = ctx.cancelled() => {}
            res = self.talk(stream) => match res {
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!(%peer, error = %e, "remote admin connection dropped");
                }
                Err(e) => debug!(%peer, error = %e, "remote admin connection error"),
                Ok(()) => {}
            }
        }
        debug!(%peer, "remote admin connection closed");
    }

    async fn talk(self, stream: TcpStream) -> std::io::Result<()> {
        let (read, mut write) = stream.into_split();
        let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(MAX_LINE));

        write.write_all(b"Authentication required.\r\n").await?;
        match next_line(&mut lines).await? {
            Some(line) if line.trim_end() == self.secret => {}
            _ => {
                warn!(peer = %self.peer, "remote admin authentication failed");
                write.write_all(b"Authentication failed.\r\n").await?;
                return Ok(());
            }
        }
        info!(peer = %self.peer, "remote admin session opened");
        write.write_all(format!("Welcome.\r\n{PROMPT}").as_bytes()).await?;

        while let Some(line) = next_line(&mut lines).await? {
            let line = line.trim();
            if line.is_empty() {
                write.write_all(PROMPT.as_bytes()).await?;
                continue;
            }
            if line == "quit" {
                break;
            }

            let (tx, mut rx) = mpsc::unbounded_channel();
            let done = tx.clone();
            self.queue.enqueue(CommandRequest::new(
                line,
                Some(SessionId::Remote(self.peer)),
                Box::new(move |text: &str| {
                    let _ = tx.send(Reply::Output(text.to_string()));
                }),
                Box::new(move |ok: bool| {
                    let _ = done.send(Reply::Done(ok));
                }),
            ));

            while let Some(reply) = rx.recv().await {
                match reply {
                    Reply::Output(text) => {
                        write.write_all(text.replace('\n', "\r\n").as_bytes()).await?;
                        if !text.ends_with('\n') {
                            write.write_all(b"\r\n").await?;
                        }
                    }
                    Reply::Done(ok) => {
                        debug!(peer = %self.peer, command = line, ok, "remote command finished");
                        break;
                    }
                }
            }
            write.write_all(PROMPT.as_bytes()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandOutcome;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::task::JoinHandle;

    type ClientLines = tokio::io::Lines<BufReader<OwnedReadHalf>>;

    struct Running {
        addr: SocketAddr,
        queue: CommandQueue,
        ctx: CancellationToken,
        run: JoinHandle<Result<(), WorkerError>>,
    }

    impl Running {
        async fn stop(self) {
            self.ctx.cancel();
            self.run.await.unwrap().unwrap();
        }
    }

    async fn start(secret: &str) -> Running {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let queue = CommandQueue::new();
        let ctx = CancellationToken::new();
        let addr = "127.0.0.1:0".parse().unwrap();
        let admin = RemoteAdmin::new(addr, secret, queue.clone(), bus);
        let run = tokio::spawn(Box::new(admin).run(ctx.clone()));
        let addr = rx.recv().await.unwrap().addr.unwrap();
        Running {
            addr,
            queue,
            ctx,
            run,
        }
    }

    async fn read_until(lines: &mut ClientLines, want: &str) {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.contains(want) {
                return;
            }
        }
        panic!("connection closed before {want:?}");
    }

    #[tokio::test]
    async fn authenticated_lines_become_requests() {
        let srv = start("s3cret").await;
        let (read, mut write) = TcpStream::connect(srv.addr).await.unwrap().into_split();
        let mut lines = BufReader::new(read).lines();

        read_until(&mut lines, "Authentication required.").await;
        write.write_all(b"s3cret\r\n").await.unwrap();
        read_until(&mut lines, "Welcome.").await;
        write.write_all(b"ping\r\n").await.unwrap();

        let mut sessions = Vec::new();
        while srv.queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        srv.queue.try_dequeue_all(|req| {
            sessions.push(req.session().cloned());
            assert_eq!(req.text(), "ping");
            CommandOutcome::ok("pong")
        });
        read_until(&mut lines, "pong").await;
        assert!(matches!(sessions[0], Some(SessionId::Remote(_))));

        srv.stop().await;
    }

    #[tokio::test]
    async fn wrong_secret_closes_the_connection() {
        let srv = start("s3cret").await;
        let (read, mut write) = TcpStream::connect(srv.addr).await.unwrap().into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"guess\r\n").await.unwrap();
        read_until(&mut lines, "Authentication failed.").await;
        assert!(lines.next_line().await.unwrap().is_none());
        assert!(srv.queue.is_empty());

        srv.stop().await;
    }

    #[tokio::test]
    async fn endless_line_before_the_secret_closes_the_connection() {
        let srv = start("s3cret").await;
        let (read, mut write) = TcpStream::connect(srv.addr).await.unwrap().into_split();
        let mut lines = BufReader::new(read).lines();

        read_until(&mut lines, "Authentication required.").await;
        let flood = vec![b'x'; MAX_LINE * 4];
        // The server may close mid-write.
        let _ = write.write_all(&flood).await;

        let next = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap();
        assert!(!matches!(next, Ok(Some(_))));
        assert!(srv.queue.is_empty());

        srv.stop().await;
    }

    #[tokio::test]
    async fn empty_secret_does_not_listen() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let admin = RemoteAdmin::new(addr, "", CommandQueue::new(), Bus::new(4));
        Box::new(admin).run(CancellationToken::new()).await.unwrap();
    }
}
