//! # Console input loop.
//!
//! Reads one line at a time from a [`LineSource`] on the `console` thread and turns
//! every non-blank line into a [`CommandRequest`] on the [`CommandQueue`].
//!
//! ```text
//! read_line(prompt)
//!     ├─► Text / Bytes ─► strip terminator ─► decode (fails → discard, re-prompt)
//!     │                        └─► blank → re-prompt
//!     │                        └─► history + enqueue(output → console, completion → prompt)
//!     ├─► Interrupted ──► request(Restart), exit
//!     └─► Eof ──────────► request(Shutdown), exit
//! ```
//!
//! The loop checks its stop token between reads. A read blocked in the terminal has
//! no cancellation; the supervisor fires the source's unblock hook when it has one
//! and otherwise abandons the thread after a bounded join.

use std::borrow::Cow;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use encoding_rs::{Encoding, UTF_8};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{CommandQueue, CommandRequest};
use crate::config::ConsoleConfig;
use crate::core::{ShutdownReason, Termination};
use crate::error::WorkerError;
use crate::workers::source::{LineSource, ReadOutcome, SourceFactory};
use crate::workers::{on_thread, BoxWorkerFuture, Unblocker, Worker, CONSOLE};

/// Terminal bell.
const BELL: &str = "\x07";

/// Resolved console settings.
#[derive(Clone, Debug)]
pub struct ConsoleSettings {
    /// Prompt text.
    pub prompt: String,
    /// Ring the bell once at start.
    pub beep_at_start: bool,
    /// Console text encoding.
    pub encoding: &'static Encoding,
}

impl ConsoleSettings {
    /// Resolves `cfg`; an unknown encoding label falls back to UTF-8.
    pub fn from_config(cfg: &ConsoleConfig) -> Self {
        let encoding = Encoding::for_label(cfg.encoding.trim().as_bytes()).unwrap_or_else(|| {
            warn!(label = %cfg.encoding, "unknown console encoding, using utf-8");
            UTF_8
        });
        Self {
            prompt: cfg.prompt.clone(),
            beep_at_start: cfg.beep_at_start,
            encoding,
        }
    }
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self::from_config(&ConsoleConfig::default())
    }
}

/// Shared console writer; re-encodes UTF-8 text into the console encoding.
#[derive(Clone)]
pub struct ConsoleOutput {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    encoding: &'static Encoding,
}

impl ConsoleOutput {
    /// Writer over standard output.
    pub fn stdout(encoding: &'static Encoding) -> Self {
        Self::new(Box::new(std::io::stdout()), encoding)
    }

    /// Writer over `out`.
    pub fn new(out: Box<dyn Write + Send>, encoding: &'static Encoding) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            encoding,
        }
    }

    /// Writes `text` as is (after re-encoding).
    pub fn write(&self, text: &str) {
        let (bytes, _, _) = self.encoding.encode(text);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = out.write_all(&bytes);
        let _ = out.flush();
    }

    /// Writes `text` and terminates the line if needed.
    pub fn write_line(&self, text: &str) {
        if text.ends_with('\n') {
            self.write(text);
        } else {
            self.write(&format!("{text}\n"));
        }
    }
}

/// Decodes one raw console line; `None` if it is not valid in `encoding`.
pub fn decode_line(encoding: &'static Encoding, raw: &[u8]) -> Option<String> {
    let end = raw
        .iter()
        .rposition(|b| *b != b'\n' && *b != b'\r')
        .map_or(0, |at| at + 1);
    encoding
        .decode_without_bom_handling_and_without_replacement(&raw[..end])
        .map(Cow::into_owned)
}

#[derive(Default)]
struct UnblockSlot {
    state: Mutex<(Option<Unblocker>, bool)>,
}

impl UnblockSlot {
    fn install(&self, hook: Option<Unblocker>) {
        let fire = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.0 = hook.clone();
            state.1
        };
        if fire {
            if let Some(hook) = hook {
                hook();
            }
        }
    }

    fn fire(&self) {
        let hook = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.1 = true;
            state.0.clone()
        };
        match hook {
            Some(hook) => hook(),
            None => debug!("console source has no unblock hook"),
        }
    }
}

struct ReadLoop {
    settings: ConsoleSettings,
    queue: CommandQueue,
    output: ConsoleOutput,
}

/// The console worker.
pub struct ConsoleWorker {
    lp: ReadLoop,
    termination: Termination,
    source: SourceFactory,
    slot: Arc<UnblockSlot>,
}

impl ConsoleWorker {
    /// Creates the worker; `source` is opened on the console thread.
    pub fn new(
        settings: ConsoleSettings,
        queue: CommandQueue,
        termination: Termination,
        output: ConsoleOutput,
        source: SourceFactory,
    ) -> Self {
        Self {
            lp: ReadLoop {
                settings,
                queue,
                output,
            },
            termination,
            source,
            slot: Arc::new(UnblockSlot::default()),
        }
    }

    fn run_blocking(self, ctx: CancellationToken) -> Result<(), WorkerError> {
        let ConsoleWorker {
            lp,
            termination,
            source,
            slot,
        } = self;
        let mut source = source().map_err(|e| WorkerError::Fail {
            error: format!("cannot open console input: {e}"),
        })?;
        slot.install(source.unblocker());

        if lp.settings.beep_at_start {
            lp.output.write(BELL);
        }
        info!("console ready");

        let end = lp.run(source.as_mut(), &ctx);
        source.finish();

        if let Some(reason) = end {
            info!(%reason, "console input closed");
            termination.request(reason);
        }
        Ok(())
    }
}

impl ReadLoop {
    fn run(&self, source: &mut dyn LineSource, ctx: &CancellationToken) -> Option<ShutdownReason> {
        loop {
            if ctx.is_cancelled() {
                return None;
            }
            let text = match source.read_line(&self.settings.prompt) {
                ReadOutcome::Text(text) => text,
                ReadOutcome::Bytes(raw) => match decode_line(self.settings.encoding, &raw) {
                    Some(text) => text,
                    None => {
                        debug!("discarding console line not valid in console encoding");
                        continue;
                    }
                },
                ReadOutcome::Interrupted => return Some(ShutdownReason::Restart),
                ReadOutcome::Eof => return Some(ShutdownReason::Shutdown),
            };

            let line = text.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || ctx.is_cancelled() {
                continue;
            }
            source.add_history(line);
            self.queue.enqueue(self.request(line));
        }
    }

    fn request(&self, line: &str) -> CommandRequest {
        let out = self.output.clone();
        let prompt = self.output.clone();
        let text = self.settings.prompt.clone();
        CommandRequest::console(
            line,
            Box::new(move |output: &str| out.write_line(output)),
            Box::new(move |_ok: bool| prompt.write(&text)),
        )
    }
}

impl Worker for ConsoleWorker {
    fn name(&self) -> &str {
        CONSOLE
    }

    fn unblocker(&self) -> Option<Unblocker> {
        let slot = self.slot.clone();
        Some(Arc::new(move || slot.fire()))
    }

    fn run(self: Box<Self>, ctx: CancellationToken) -> BoxWorkerFuture {
        let this = *self;
        on_thread(CONSOLE, move || this.run_blocking(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandOutcome;
    use crate::workers::source::{ScriptFeed, ScriptedSource};

    #[derive(Clone, Default)]
    struct Buf(Arc<Mutex<Vec<u8>>>);

    impl Write for Buf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        worker: Box<ConsoleWorker>,
        feed: ScriptFeed,
        queue: CommandQueue,
        termination: Termination,
        buf: Buf,
    }

    fn harness(settings: ConsoleSettings) -> Harness {
        let (source, feed) = ScriptedSource::new();
        let queue = CommandQueue::new();
        let termination = Termination::new();
        let buf = Buf::default();
        let output = ConsoleOutput::new(Box::new(buf.clone()), settings.encoding);
        let worker = Box::new(ConsoleWorker::new(
            settings,
            queue.clone(),
            termination.clone(),
            output,
            Box::new(move || Ok::<_, std::io::Error>(Box::new(source) as Box<dyn LineSource>)),
        ));
        Harness {
            worker,
            feed,
            queue,
            termination,
            buf,
        }
    }

    fn quiet() -> ConsoleSettings {
        ConsoleSettings {
            beep_at_start: false,
            ..ConsoleSettings::default()
        }
    }

    fn texts(queue: &CommandQueue) -> Vec<String> {
        let mut seen = Vec::new();
        queue.try_dequeue_all(|req| {
            seen.push(req.text().to_string());
            CommandOutcome::ok("")
        });
        seen
    }

    #[tokio::test]
    async fn lines_are_queued_and_eof_requests_shutdown() {
        let h = harness(quiet());
        h.feed.line("help").line("").line("   ").line("server info\r\n").eof();

        h.worker.run(CancellationToken::new()).await.unwrap();

        assert_eq!(texts(&h.queue), vec!["help", "server info"]);
        assert_eq!(h.feed.history(), vec!["help", "server info"]);
        assert_eq!(h.termination.reason(), Some(ShutdownReason::Shutdown));
    }

    #[tokio::test]
    async fn interrupt_requests_restart() {
        let h = harness(quiet());
        h.feed.interrupt();
        h.worker.run(CancellationToken::new()).await.unwrap();
        assert_eq!(h.termination.reason(), Some(ShutdownReason::Restart));
    }

    #[tokio::test]
    async fn undecodable_lines_are_discarded() {
        let h = harness(quiet());
        h.feed.bytes(&[0xff, 0xfe, b'\n']).bytes(b"ping\r\n").eof();
        h.worker.run(CancellationToken::new()).await.unwrap();
        assert_eq!(texts(&h.queue), vec!["ping"]);
    }

    #[tokio::test]
    async fn console_encoding_is_decoded() {
        let settings = ConsoleSettings {
            encoding: encoding_rs::WINDOWS_1251,
            ..quiet()
        };
        let h = harness(settings);
        h.feed.bytes(&[0xEF, 0xF0, 0xE8, b'\n']).eof();
        h.worker.run(CancellationToken::new()).await.unwrap();
        assert_eq!(texts(&h.queue), vec!["при"]);
    }

    #[tokio::test]
    async fn output_then_prompt_on_completion() {
        let h = harness(ConsoleSettings::default());
        h.feed.line("ping").eof();
        h.worker.run(CancellationToken::new()).await.unwrap();

        h.queue.try_dequeue_all(|_| CommandOutcome::ok("pong"));
        let written = String::from_utf8(h.buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "\x07pong\nmangos>");
    }

    #[tokio::test]
    async fn unblock_ends_a_blocked_read_without_a_reason() {
        let h = harness(quiet());
        let unblock = h.worker.unblocker().unwrap();
        let ctx = CancellationToken::new();
        let run = tokio::spawn(h.worker.run(ctx.clone()));

        ctx.cancel();
        unblock();
        run.await.unwrap().unwrap();

        assert!(h.termination.reason().is_none());
        assert!(h.queue.is_empty());
    }

    #[test]
    fn decode_strips_terminators() {
        assert_eq!(decode_line(UTF_8, b"account\r\n").as_deref(), Some("account"));
        assert_eq!(decode_line(UTF_8, b"\n").as_deref(), Some(""));
        assert!(decode_line(UTF_8, &[0xc3]).is_none());
    }

    #[test]
    fn output_is_reencoded() {
        let buf = Buf::default();
        let out = ConsoleOutput::new(Box::new(buf.clone()), encoding_rs::WINDOWS_1251);
        out.write("при");
        assert_eq!(*buf.0.lock().unwrap(), vec![0xEF, 0xF0, 0xE8]);
    }
}
