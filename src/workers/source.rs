//! Line sources for the console loop.
//!
//! - [`ReadlineSource`] interactive terminal: editing, history, first-word completion
//! - [`StdinSource`] plain byte reads from standard input, decoded by the console
//! - [`ScriptedSource`] lines pushed through a [`ScriptFeed`], used by tests and piping tools
//!
//! None of the terminal sources can be cancelled while blocked in a read; only
//! [`ScriptedSource`] provides an unblock hook.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Context, Editor, Helper, Highlighter, Hinter, Validator};
use tracing::warn;

use crate::commands::{complete_command, CommandInfo};
use crate::workers::Unblocker;

/// Result of one blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Line already in canonical encoding.
    Text(String),
    /// Raw line in the console encoding, possibly with its terminator.
    Bytes(Vec<u8>),
    /// Interactive interrupt (Ctrl-C inside the editor).
    Interrupted,
    /// Input closed.
    Eof,
}

/// A blocking, line-at-a-time input.
///
/// Created on the console thread, so it does not need to be `Send`.
pub trait LineSource {
    /// Shows `prompt` and blocks for the next line.
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;

    /// Records an accepted command line.
    fn add_history(&mut self, _line: &str) {}

    /// Hook that makes a blocked [`read_line`](LineSource::read_line) return.
    fn unblocker(&self) -> Option<Unblocker> {
        None
    }

    /// Called once when the loop ends.
    fn finish(&mut self) {}
}

/// Builds the source on the console thread.
pub type SourceFactory = Box<dyn FnOnce() -> std::io::Result<Box<dyn LineSource>> + Send>;

/// Completion candidates for the word under the cursor.
///
/// Only the first word completes; anywhere else yields nothing. Returns the start
/// offset of the replaced word and the candidates.
pub fn first_word_candidates(
    table: &[CommandInfo],
    line: &str,
    pos: usize,
) -> (usize, Vec<&'static str>) {
    let head = line.get(..pos).unwrap_or(line);
    let start = head.len() - head.trim_start().len();
    let word = &head[start..];
    if word.contains(char::is_whitespace) {
        return (pos, Vec::new());
    }
    (start, complete_command(table, word))
}

#[derive(Helper, Hinter, Highlighter, Validator)]
struct ConsoleHelper {
    table: &'static [CommandInfo],
}

impl Completer for ConsoleHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let (start, found) = first_word_candidates(self.table, line, pos);
        Ok((start, found.into_iter().map(str::to_string).collect()))
    }
}

/// Terminal line editor.
pub struct ReadlineSource {
    editor: Editor<ConsoleHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl ReadlineSource {
    /// Opens the editor; loads history from `history_file` when given.
    pub fn open(
        table: &'static [CommandInfo],
        history_file: Option<PathBuf>,
    ) -> Result<Self, ReadlineError> {
        let mut editor = Editor::<ConsoleHelper, DefaultHistory>::new()?;
        editor.set_helper(Some(ConsoleHelper { table }));
        if let Some(path) = &history_file {
            let _ = editor.load_history(path);
        }
        Ok(Self {
            editor,
            history_file,
        })
    }
}

impl LineSource for ReadlineSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => ReadOutcome::Text(line),
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(ReadlineError::Eof) => ReadOutcome::Eof,
            Err(e) => {
                warn!(error = %e, "console read failed");
                ReadOutcome::Eof
            }
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }

    fn finish(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                warn!(path = %path.display(), error = %e, "cannot save console history");
            }
        }
    }
}

/// Plain standard input.
#[derive(Debug, Default)]
pub struct StdinSource;

impl LineSource for StdinSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(prompt.as_bytes());
            let _ = out.flush();
        }
        let mut buf = Vec::new();
        match std::io::stdin().lock().read_until(b'\n', &mut buf) {
            Ok(0) => ReadOutcome::Eof,
            Ok(_) => ReadOutcome::Bytes(buf),
            Err(e) => {
                warn!(error = %e, "console read failed");
                ReadOutcome::Eof
            }
        }
    }
}

/// Source fed from a [`ScriptFeed`]; blocks when the script is exhausted.
pub struct ScriptedSource {
    rx: mpsc::Receiver<ReadOutcome>,
    wake: mpsc::Sender<ReadOutcome>,
    history: Arc<Mutex<Vec<String>>>,
}

/// Producer side of a [`ScriptedSource`].
#[derive(Clone)]
pub struct ScriptFeed {
    tx: mpsc::Sender<ReadOutcome>,
    history: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    /// Creates a connected source and feed.
    pub fn new() -> (Self, ScriptFeed) {
        let (tx, rx) = mpsc::channel();
        let history = Arc::new(Mutex::new(Vec::new()));
        let source = Self {
            rx,
            wake: tx.clone(),
            history: history.clone(),
        };
        (source, ScriptFeed { tx, history })
    }
}

impl LineSource for ScriptedSource {
    fn read_line(&mut self, _prompt: &str) -> ReadOutcome {
        self.rx.recv().unwrap_or(ReadOutcome::Eof)
    }

    fn add_history(&mut self, line: &str) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }

    fn unblocker(&self) -> Option<Unblocker> {
        let wake = Mutex::new(self.wake.clone());
        Some(Arc::new(move || {
            let _ = wake
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .send(ReadOutcome::Text(String::new()));
        }))
    }
}

impl ScriptFeed {
    /// Queues a text line.
    pub fn line(&self, text: &str) -> &Self {
        self.push(ReadOutcome::Text(text.to_string()))
    }

    /// Queues raw bytes in the console encoding.
    pub fn bytes(&self, raw: &[u8]) -> &Self {
        self.push(ReadOutcome::Bytes(raw.to_vec()))
    }

    /// Queues an interactive interrupt.
    pub fn interrupt(&self) -> &Self {
        self.push(ReadOutcome::Interrupted)
    }

    /// Queues end of input.
    pub fn eof(&self) -> &Self {
        self.push(ReadOutcome::Eof)
    }

    /// Lines the console added to history.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, outcome: ReadOutcome) -> &Self {
        let _ = self.tx.send(outcome);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::DEFAULT_COMMANDS;

    #[test]
    fn completes_only_the_first_word() {
        let (start, found) = first_word_candidates(DEFAULT_COMMANDS, "  ban", 5);
        assert_eq!(start, 2);
        assert_eq!(found, vec!["ban", "baninfo", "banlist"]);

        let (_, found) = first_word_candidates(DEFAULT_COMMANDS, "ban ba", 6);
        assert!(found.is_empty());
    }

    #[test]
    fn cursor_inside_first_word_uses_text_before_it() {
        let (start, found) = first_word_candidates(DEFAULT_COMMANDS, "reset all", 3);
        assert_eq!(start, 0);
        assert_eq!(found, vec!["reset"]);
    }

    #[test]
    fn scripted_unblock_returns_an_empty_line() {
        let (mut source, feed) = ScriptedSource::new();
        feed.line("help");
        assert_eq!(source.read_line(">"), ReadOutcome::Text("help".into()));

        (source.unblocker().unwrap())();
        assert_eq!(source.read_line(">"), ReadOutcome::Text(String::new()));
    }
}
