// Progress/result stream — the ordered event sequence one run produces.
//
// A run moves forward through a fixed set of stages. Every progress event
// carries a percent that never goes down, and the stream ends with exactly
// one terminal event (`complete` or `error`). Anything sent after that is
// dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::result::AnalysisResult;

/// Pipeline stages in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Received,
    Modeling,
    Clustering,
    Enhancing,
    Summarizing,
    Complete,
    Error,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Error)
    }
}

/// One block of the response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StreamEvent {
    Progress { message: String, progress: u8 },
    Complete { data: AnalysisResult },
    Error { error: String, traceback: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Progress { .. })
    }

    /// Wire framing: compact JSON followed by a blank line.
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","error":"Failed to encode event: {e}","traceback":""}}"#
            )
        });
        format!("{json}\n\n")
    }
}

/// Sender side of one run's stream, enforcing the stage order.
pub struct Progress {
    tx: mpsc::Sender<StreamEvent>,
    stage: Stage,
    percent: u8,
    receiver_gone: bool,
}

impl Progress {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            stage: Stage::Received,
            percent: 0,
            receiver_gone: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Move to `stage` (or stay in it) and report progress. Backwards moves
    /// and moves out of a terminal stage are ignored.
    pub async fn advance(&mut self, stage: Stage, message: &str, percent: u8) {
        if self.stage.is_terminal() || stage.is_terminal() || stage < self.stage {
            warn!(from = ?self.stage, to = ?stage, message, "Ignoring out-of-order progress");
            return;
        }
        self.stage = stage;
        self.percent = self.percent.max(percent.min(100));
        let event = StreamEvent::Progress {
            message: message.to_string(),
            progress: self.percent,
        };
        self.send(event).await;
    }

    /// Emit the final 100% progress event and the result.
    pub async fn complete(&mut self, data: AnalysisResult) {
        if self.stage.is_terminal() {
            return;
        }
        self.percent = 100;
        self.send(StreamEvent::Progress {
            message: "Complete".to_string(),
            progress: 100,
        })
        .await;
        self.stage = Stage::Complete;
        self.send(StreamEvent::Complete { data }).await;
    }

    pub async fn fail(&mut self, error: String, traceback: String) {
        if self.stage.is_terminal() {
            return;
        }
        self.stage = Stage::Error;
        self.send(StreamEvent::Error { error, traceback }).await;
    }

    async fn send(&mut self, event: StreamEvent) {
        if self.receiver_gone {
            return;
        }
        // A disconnected client does not stop the run.
        if self.tx.send(event).await.is_err() {
            debug!(stage = ?self.stage, "Stream receiver dropped, continuing without output");
            self.receiver_gone = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn test_percent_never_decreases() {
        let (tx, rx) = mpsc::channel(16);
        let mut progress = Progress::new(tx);
        progress.advance(Stage::Modeling, "a", 30).await;
        progress.advance(Stage::Modeling, "b", 10).await;
        assert_eq!(progress.percent(), 30);
        drop(progress);

        let events = drain(rx).await;
        assert_eq!(
            events[1],
            StreamEvent::Progress {
                message: "b".to_string(),
                progress: 30
            }
        );
    }

    #[tokio::test]
    async fn test_backwards_stage_ignored() {
        let (tx, rx) = mpsc::channel(16);
        let mut progress = Progress::new(tx);
        progress.advance(Stage::Enhancing, "enhancing", 85).await;
        progress.advance(Stage::Modeling, "modeling", 90).await;
        assert_eq!(progress.stage(), Stage::Enhancing);
        drop(progress);
        assert_eq!(drain(rx).await.len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_after_terminal() {
        let (tx, rx) = mpsc::channel(16);
        let mut progress = Progress::new(tx);
        progress.fail("boom".to_string(), "trace".to_string()).await;
        progress.advance(Stage::Summarizing, "late", 95).await;
        progress.fail("again".to_string(), String::new()).await;
        drop(progress);

        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[test]
    fn test_frame_shape() {
        let frame = StreamEvent::Progress {
            message: "Loading models...".to_string(),
            progress: 10,
        }
        .to_frame();
        assert_eq!(
            frame,
            "{\"status\":\"progress\",\"message\":\"Loading models...\",\"progress\":10}\n\n"
        );
    }
}
