use std::time::Duration;

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Line(String),
    Tick,
    /// stdin closed
    Eof,
}

/// Merges stdin lines with a periodic tick on one channel
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _tx = tx.clone();

        // Spawn stdin reader task
        let tx_lines = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();
            loop {
                let event = match lines.next_line().await {
                    Ok(Some(line)) => AppEvent::Line(line),
                    Ok(None) => AppEvent::Eof,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to read stdin");
                        AppEvent::Eof
                    }
                };
                let done = event == AppEvent::Eof;
                if tx_lines.send(event).is_err() || done {
                    break;
                }
            }
        });

        // Spawn tick timer driving the pollers
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}
