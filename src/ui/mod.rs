//! # UI Publication
//!
//! The data contract toward the display layer: a status token, the
//! ranked labels and a throughput scalar, delivered through the
//! [`ResultSink`] seam. The console sink renders results in the
//! terminal; the actual viewer widget is an external collaborator.

use std::fmt;
use colored::Colorize;
use comfy_table::Table;

/// Status token published alongside results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiStatus {
    Running,
    Done,
    Error,
}

impl AiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiStatus::Running => "running",
            AiStatus::Done => "done",
            AiStatus::Error => "error",
        }
    }
}

impl fmt::Display for AiStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the ranked output: presentable label and percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedLabel {
    pub label: String,
    /// Probability as a percentage, clamped to [0, 100]
    pub percent: f32,
}

/// UI collaborator contract.
pub trait ResultSink: Send + Sync {
    fn set_status(&self, status: AiStatus);
    fn publish_ranking(&self, ranked: &[RankedLabel]);
    fn publish_fps(&self, fps: f32);
}

/// Terminal sink rendering the ranked classes as a table.
pub struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn set_status(&self, status: AiStatus) {
        let chip = match status {
            AiStatus::Running => status.as_str().yellow(),
            AiStatus::Done => status.as_str().green(),
            AiStatus::Error => status.as_str().red(),
        };
        println!("AI: {}", chip);
    }

    fn publish_ranking(&self, ranked: &[RankedLabel]) {
        let mut table = Table::new();
        table.set_header(vec!["class", "confidence"]);
        for entry in ranked {
            table.add_row(vec![entry.label.clone(), format!("{:.1}%", entry.percent)]);
        }
        println!("{table}");
    }

    fn publish_fps(&self, fps: f32) {
        println!("FPS: {:.1}", fps);
    }
}

/// Sink that drops everything (headless runs).
pub struct NullSink;

impl ResultSink for NullSink {
    fn set_status(&self, _status: AiStatus) {}
    fn publish_ranking(&self, _ranked: &[RankedLabel]) {}
    fn publish_fps(&self, _fps: f32) {}
}
