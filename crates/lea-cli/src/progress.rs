//! Progress sink implementations: terminal renderer and JSON lines.

use indicatif::{ProgressBar, ProgressStyle};
use lea_core::progress::{NodeStatus, ProgressEvent, ProgressSink};

/// Terminal renderer: one spinner-style bar plus a ✓/✗ line per node.
pub struct TerminalSink {
    bar: ProgressBar,
}

impl TerminalSink {
    /// Create a bar sized to the number of runnable nodes.
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .expect("static progress bar template is valid")
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Finish the bar once the run is over.
    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

impl ProgressSink for TerminalSink {
    fn emit(&self, event: ProgressEvent) {
        match event.status {
            NodeStatus::Started => {
                self.bar.set_message(event.node.dotted());
            }
            NodeStatus::Done => {
                let duration = event.duration.unwrap_or_default();
                let rows = event
                    .rows
                    .map(|r| format!(", {r} rows"))
                    .unwrap_or_default();
                self.bar.println(format!(
                    "  \u{2713} {} [{}ms{rows}]",
                    event.node,
                    duration.as_millis()
                ));
                self.bar.inc(1);
            }
            NodeStatus::Skipped => {
                self.bar.println(format!("  - {} (skipped)", event.node));
                self.bar.inc(1);
            }
            NodeStatus::SkippedUpstream => {
                self.bar
                    .println(format!("  - {} (skipped: upstream error)", event.node));
                self.bar.inc(1);
            }
            NodeStatus::Errored => {
                let duration = event.duration.unwrap_or_default();
                let message = event.message.as_deref().unwrap_or("unknown error");
                self.bar.println(format!(
                    "  \u{2717} {} - {message} [{}ms]",
                    event.node,
                    duration.as_millis()
                ));
                self.bar.inc(1);
            }
        }
    }
}

/// One JSON object per event on stdout.
#[derive(Debug, Default)]
pub struct JsonSink;

impl ProgressSink for JsonSink {
    fn emit(&self, event: ProgressEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => log::warn!("failed to serialize progress event: {e}"),
        }
    }
}
