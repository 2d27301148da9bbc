//! Line-delimited JSON input
//!
//! External collaborators (detector, scene classifier, intent parser) write one
//! JSON object per line, tagged by `type`:
//!
//! ```text
//! {"type":"detection","x":0.62,"y":0.48,"confidence":0.9}
//! {"type":"lost"}
//! {"type":"description","text":"a person at a whiteboard"}
//! {"type":"intent","intent":"switch_scene","action":"switcher","params":{"scene_number":2}}
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::Intent;
use crate::error::Result;
use crate::state::AppState;
use crate::tracking::DetectionPoint;

/// Pending intents waiting for the command worker
const INTENT_QUEUE_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Detection(DetectionPoint),
    /// Target no longer visible
    Lost,
    Description { text: String },
    Intent(Intent),
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<FeedMessage>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Counters reported when the feed ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub lines: u64,
    pub malformed: u64,
    /// Detections received while tracking was off
    pub ignored_detections: u64,
}

/// Read the feed until EOF or cancellation
///
/// Detections go to the tracking loop without waiting. Intents run one at a
/// time, in order, on a separate worker so a momentary move does not hold up
/// detections; their outcome is published on the event bus.
pub async fn run<R>(reader: R, state: Arc<AppState>, cancel: CancellationToken) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = FeedStats::default();

    let (intent_tx, mut intent_rx) = mpsc::channel::<Intent>(INTENT_QUEUE_SIZE);
    let dispatcher = state.dispatcher.clone();
    let worker = tokio::spawn(async move {
        while let Some(intent) = intent_rx.recv().await {
            dispatcher.execute(&intent).await;
        }
    });

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            info!("Feed closed");
            break;
        };
        stats.lines += 1;

        let message = match parse_line(&line) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                stats.malformed += 1;
                warn!("Skipping malformed feed line {}: {}", stats.lines, e);
                continue;
            }
        };

        match message {
            FeedMessage::Detection(point) => {
                if !state.tracking.submit(Some(point)) {
                    stats.ignored_detections += 1;
                }
            }
            FeedMessage::Lost => {
                state.tracking.submit(None);
            }
            FeedMessage::Description { text } => match state.rules.clone() {
                Some(rules) => {
                    tokio::spawn(async move {
                        rules.process_description(&text).await;
                    });
                }
                None => debug!("No rule engine, ignoring description"),
            },
            FeedMessage::Intent(intent) => {
                if intent_tx.send(intent).await.is_err() {
                    warn!("Command worker stopped");
                    break;
                }
            }
        }
    }

    drop(intent_tx);
    if cancel.is_cancelled() {
        worker.abort();
    }
    let _ = worker.await;

    Ok(stats)
}
