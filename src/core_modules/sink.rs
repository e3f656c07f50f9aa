// THEORY:
// The sink is the single consumer at the end of the pipeline and the exclusive owner
// of the output destination. Workers and the input reader push `Outcome`s at it; it
// handles each one in arrival order:
//
// - `Completed` records become one `URL, color1, color2, color3` line, appended to the
//   destination and mirrored to the log.
// - `Failed` items are logged with their URL and cause. They never produce a line, so
//   a failed item cannot leave a partial row behind.
//
// Either way the outcome is terminal, and the sink reports it to the
// `CompletionTracker`. Under the strict policy the first failure also cancels the run;
// rows that were already complete keep being written until the channel closes.

use crate::core_modules::color_tally::TopColors;
use crate::core_modules::completion::CompletionTracker;
use crate::error::{ItemError, PipelineError};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Log target used to mirror every written row.
pub const ROW_LOG_TARGET: &str = "prevalent_colors::rows";

/// What happens to the rest of the run when an item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the failure, skip the item, keep going.
    #[default]
    Lenient,
    /// Cancel the run on the first failure.
    Strict,
}

/// How an existing output file is treated when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Discard any previous content.
    #[default]
    Truncate,
    /// Keep previous content and append new rows after it.
    Append,
    /// Refuse to run if the file already exists.
    CreateNew,
}

/// The computed colors for one URL, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    /// The URL exactly as it appeared (trimmed) in the input.
    pub url: String,
    pub colors: TopColors,
}

/// Terminal state of one work item.
#[derive(Debug)]
pub enum Outcome {
    Completed(ResultRecord),
    Failed(ItemError),
}

/// Totals reported by the sink once its channel closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkReport {
    pub written: u64,
    pub failed: u64,
}

/// Formats a record as one output line, trailing newline included.
///
/// Absent ranks are empty fields, so a two-color image ends in `", "`.
pub fn format_row(record: &ResultRecord) -> String {
    let ranks = *record.colors.ranks();
    let [first, second, third] =
        ranks.map(|rank| rank.map(|ranked| ranked.key.to_string()).unwrap_or_default());
    format!("{}, {}, {}, {}\n", record.url, first, second, third)
}

/// Opens (creating if needed) the output file according to `mode`.
pub async fn open_output(path: &Path, mode: OutputMode) -> Result<File, PipelineError> {
    let mut options = OpenOptions::new();
    match mode {
        OutputMode::Truncate => options.write(true).create(true).truncate(true),
        OutputMode::Append => options.append(true).create(true),
        OutputMode::CreateNew => options.write(true).create_new(true),
    };
    options
        .open(path)
        .await
        .map_err(|source| PipelineError::OpenOutput {
            path: path.to_path_buf(),
            source,
        })
}

/// Single consumer that owns the output destination.
pub struct ResultSink<W> {
    writer: BufWriter<W>,
    tracker: CompletionTracker,
    policy: ErrorPolicy,
    cancel: CancellationToken,
    first_failure: Option<ItemError>,
    report: SinkReport,
}

impl<W: AsyncWrite + Unpin> ResultSink<W> {
    pub fn new(
        writer: W,
        tracker: CompletionTracker,
        policy: ErrorPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            writer: BufWriter::new(writer),
            tracker,
            policy,
            cancel,
            first_failure: None,
            report: SinkReport::default(),
        }
    }

    /// Consumes outcomes until every sender is gone, then flushes the destination.
    ///
    /// Under the strict policy the first item failure is returned as
    /// `PipelineError::Aborted` after the flush.
    pub async fn drain(
        mut self,
        mut outcomes: mpsc::Receiver<Outcome>,
    ) -> Result<(SinkReport, W), PipelineError> {
        while let Some(outcome) = outcomes.recv().await {
            let handled = self.handle(outcome).await;
            // Terminal either way, including a failed write.
            self.tracker.complete();
            if let Err(error) = handled {
                self.cancel.cancel();
                return Err(error);
            }
        }

        self.writer.flush().await.map_err(PipelineError::WriteOutput)?;
        self.writer.shutdown().await.map_err(PipelineError::WriteOutput)?;

        match self.first_failure {
            Some(error) => Err(PipelineError::Aborted(error)),
            None => Ok((self.report, self.writer.into_inner())),
        }
    }

    async fn handle(&mut self, outcome: Outcome) -> Result<(), PipelineError> {
        match outcome {
            Outcome::Completed(record) => {
                let row = format_row(&record);
                self.writer
                    .write_all(row.as_bytes())
                    .await
                    .map_err(PipelineError::WriteOutput)?;
                info!(target: ROW_LOG_TARGET, "{}", row.trim_end());
                self.report.written += 1;
            }
            Outcome::Failed(error) => {
                warn!(url = error.subject(), kind = error.kind(), error = %error, "item failed");
                self.report.failed += 1;
                if self.policy == ErrorPolicy::Strict && self.first_failure.is_none() {
                    self.cancel.cancel();
                    self.first_failure = Some(error);
                }
            }
        }
        Ok(())
    }
}
