//! Terminal rendering of notifications

use std::future::Future;
use std::io::{self, Write};

use tokio::sync::watch;

use crate::notification::{MessageKind, Notification};

/// Writes notification changes to a terminal stream
pub struct Terminal<W> {
    out: W,
    color: bool,
}

impl Terminal<io::Stderr> {
    /// Render to stderr
    #[must_use]
    pub fn stderr(color: bool) -> Self {
        Self::new(io::stderr(), color)
    }
}

impl<W: Write> Terminal<W> {
    /// Render to any writer
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    /// Render one state; the idle state prints nothing
    pub fn render(&mut self, state: Option<&Notification>) -> io::Result<()> {
        match state.map(|n| format_notification(n, self.color)) {
            Some(line) => writeln!(self.out, "{line}"),
            None => Ok(()),
        }
    }

    /// Consume the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One-line form of a notification
#[must_use]
pub fn format_notification(notification: &Notification, color: bool) -> String {
    match notification {
        Notification::Loading => {
            if color {
                "\x1b[2m… working\x1b[0m".to_string()
            } else {
                "… working".to_string()
            }
        }
        Notification::Message { kind, text, .. } => {
            let label = match (kind, color) {
                (MessageKind::Error, true) => "\x1b[31mERROR\x1b[0m",
                (MessageKind::Success, true) => "\x1b[32mOK\x1b[0m",
                (MessageKind::Warning, true) => "\x1b[33mWARN\x1b[0m",
                (MessageKind::Error, false) => "ERROR",
                (MessageKind::Success, false) => "OK",
                (MessageKind::Warning, false) => "WARN",
            };
            format!("{label} {text}")
        }
    }
}

/// Run `task` while rendering every notification change it causes.
///
/// Changes still pending when the task finishes are rendered before
/// returning, so the terminal action of a request is never lost.
pub async fn drive<W, F>(
    terminal: &mut Terminal<W>,
    changes: &mut watch::Receiver<Option<Notification>>,
    task: F,
) -> F::Output
where
    W: Write,
    F: Future,
{
    tokio::pin!(task);
    let output = loop {
        tokio::select! {
            output = &mut task => break output,
            Ok(()) = changes.changed() => {
                let state = changes.borrow_and_update().clone();
                if let Err(e) = terminal.render(state.as_ref()) {
                    tracing::debug!(error = %e, "Failed to render notification");
                }
            }
        }
    };

    if changes.has_changed().unwrap_or(false) {
        let state = changes.borrow_and_update().clone();
        if let Err(e) = terminal.render(state.as_ref()) {
            tracing::debug!(error = %e, "Failed to render notification");
        }
    }
    output
}
