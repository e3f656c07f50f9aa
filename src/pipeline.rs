// THEORY:
// The `pipeline` module is the top-level API of the crate. It wires the producer, the
// worker pool and the sink together around one `CompletionTracker` and one
// cancellation token, and gives callers a single call: hand it an input stream and
// an output destination, get a `RunSummary` back.
//
//   input reader ──WorkItem──▶ [shared queue] ──▶ N workers ──Outcome──▶ sink ──▶ output
//        │                                                             ▲
//        └───────────────── invalid lines (Outcome::Failed) ───────────┘
//
// The run ends when the tracker reports every submitted item terminal, or when the
// token is cancelled (strict policy, fatal I/O). Shutdown is the same either way:
// the producer stops, the queue closes, the workers drain and exit, the result channel
// closes, and the sink flushes the destination before returning.

use crate::core_modules::completion::CompletionTracker;
use crate::core_modules::fetcher::{DEFAULT_REQUEST_TIMEOUT_SECS, FormatPolicy, ImageFetcher};
use crate::core_modules::input::read_work_items;
use crate::core_modules::sink::{ErrorPolicy, ResultSink};
use crate::error::PipelineError;
use crate::parallel_pipeline::{DEFAULT_CONCURRENCY, WorkerPool};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// Re-export the types callers need to configure and inspect a run.
pub use crate::core_modules::color_tally::{RankedColor, TopColors};
pub use crate::core_modules::fetcher::{FetchedBody, HttpImageSource};
pub use crate::core_modules::sink::{OutputMode, ResultRecord};

/// Tunable behavior of a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent workers. Values below 1 are raised to 1.
    pub concurrency: usize,
    /// Capacity of the work queue and of the result channel. 0 is treated as 1.
    pub queue_capacity: usize,
    pub error_policy: ErrorPolicy,
    pub format_policy: FormatPolicy,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_CONCURRENCY,
            error_policy: ErrorPolicy::default(),
            format_policy: FormatPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    fn channel_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Work items read from the input, valid or not.
    pub submitted: u64,
    /// Rows written to the output.
    pub written: u64,
    /// Items that ended in a logged failure.
    pub failed: u64,
    pub elapsed: Duration,
}

/// The main, top-level struct: one configured pipeline around one fetcher.
pub struct ColorPipeline<F> {
    config: PipelineConfig,
    fetcher: Arc<F>,
}

impl<F: ImageFetcher + 'static> ColorPipeline<F> {
    pub fn new(config: PipelineConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes every URL in `input`, writing one row per success to `output`.
    ///
    /// Returns once every item is terminal and the output is flushed. Under the
    /// strict policy the first item failure is returned as `PipelineError::Aborted`.
    pub async fn run<R, W>(&self, input: R, output: W) -> Result<RunSummary, PipelineError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let tracker = CompletionTracker::new();
        let cancel = CancellationToken::new();
        let capacity = self.config.channel_capacity();

        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel(capacity);

        // Stage 1: Workers
        let pool = WorkerPool::spawn(
            self.config.concurrency,
            queue_rx,
            outcome_tx.clone(),
            self.fetcher.clone(),
            self.config.format_policy,
            cancel.clone(),
        );
        info!(
            workers = pool.size(),
            capacity,
            error_policy = ?self.config.error_policy,
            format_policy = ?self.config.format_policy,
            "pipeline started"
        );

        // Stage 2: Sink
        let sink = ResultSink::new(output, tracker.clone(), self.config.error_policy, cancel.clone());
        let sink = tokio::spawn(sink.drain(outcome_rx));

        // Stage 3: Producer. It owns the last outcome sender outside the pool.
        let producer = tokio::spawn(read_work_items(
            input,
            queue_tx,
            outcome_tx,
            tracker.clone(),
            cancel.clone(),
        ));

        // Stage 4: Wait for every item to be terminal, or for the run to be cancelled.
        tokio::select! {
            _ = tracker.wait() => debug!(submitted = tracker.submitted(), "all items terminal"),
            _ = cancel.cancelled() => debug!(outstanding = tracker.outstanding(), "run cancelled"),
        }

        // Stage 5: Orderly shutdown. Producer first, so the queue closes behind it.
        let produced = producer.await?;
        pool.join().await?;
        let sunk = sink.await?;

        let submitted = produced?;
        let (report, _output) = sunk?;
        let summary = RunSummary {
            submitted,
            written: report.written,
            failed: report.failed,
            elapsed: started.elapsed(),
        };
        info!(
            submitted = summary.submitted,
            written = summary.written,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pipeline finished"
        );
        Ok(summary)
    }
}

impl ColorPipeline<HttpImageSource> {
    /// A pipeline fetching over HTTP with the configured request timeout.
    pub fn over_http(config: PipelineConfig) -> Result<Self, PipelineError> {
        let source = HttpImageSource::new(config.request_timeout)
            .map_err(|e| PipelineError::HttpClient(e.to_string()))?;
        Ok(Self::new(config, source))
    }
}
