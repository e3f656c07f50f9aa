// THEORY:
// The input reader is the pipeline's only producer. It walks the input line by line,
// turns each non-blank line into a `WorkItem` and pushes it onto the shared work queue.
// Every item is counted into the `CompletionTracker` *before* it is handed off, so the
// tracker can never observe a completion it has not seen submitted.
//
// Lines that are not usable URLs are terminal on the spot: they are counted in like any
// other item and go straight to the sink as an `ItemError::Input`, skipping the workers.
// When the input is exhausted (or the run is cancelled) the tracker is sealed.

use crate::core_modules::completion::CompletionTracker;
use crate::core_modules::sink::Outcome;
use crate::error::{ItemError, PipelineError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

const SUPPORTED_SCHEMES: [&str; 2] = ["http", "https"];
const NOT_UTF8: &str = "not valid UTF-8";

/// One URL to fetch, decode and tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 1-based line number in the input.
    pub line: usize,
    /// The trimmed input line, written back verbatim in the output row.
    pub input: String,
    pub url: Url,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_work_item(line: usize, raw: &str) -> Result<Option<WorkItem>, ItemError> {
    let input = raw.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let invalid = |reason: String| ItemError::Input {
        line,
        input: input.to_string(),
        reason,
    };
    let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    Ok(Some(WorkItem {
        line,
        input: input.to_string(),
        url,
    }))
}

/// Feeds work items from `input` into `queue` until the input ends or `cancel` fires.
///
/// Returns the number of items submitted. A line that is not valid UTF-8 is an
/// `ItemError::Input` like any other malformed line. The tracker is sealed on every
/// exit path; an I/O failure while reading also cancels the run.
pub async fn read_work_items<R>(
    mut input: R,
    queue: mpsc::Sender<WorkItem>,
    outcomes: mpsc::Sender<Outcome>,
    tracker: CompletionTracker,
    cancel: CancellationToken,
) -> Result<u64, PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut line = 0usize;
    let mut submitted = 0u64;

    let result = loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            read = input.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => {
                cancel.cancel();
                break Err(PipelineError::ReadInput(e));
            }
        }
        line += 1;

        let parsed = match std::str::from_utf8(&buf) {
            Ok(raw) => parse_work_item(line, raw),
            Err(_) => Err(ItemError::Input {
                line,
                input: String::from_utf8_lossy(&buf).trim().to_string(),
                reason: NOT_UTF8.to_string(),
            }),
        };
        let outcome = match parsed {
            Ok(None) => {
                trace!(line, "skipping blank line");
                continue;
            }
            Ok(Some(item)) => {
                tracker.submit();
                submitted += 1;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Ok(()),
                    sent = queue.send(item) => sent.map_err(|_| ()),
                }
            }
            Err(error) => {
                tracker.submit();
                submitted += 1;
                outcomes.send(Outcome::Failed(error)).await.map_err(|_| ())
            }
        };
        if outcome.is_err() {
            // Downstream is gone; the run is already shutting down.
            break Ok(());
        }
    };

    tracker.seal();
    debug!(lines = line, submitted, "input exhausted");
    result.map(|()| submitted)
}
