// THEORY:
// The `WorkerPool` is the bounded-concurrency core of the pipeline: a fixed number of
// tokio tasks pulling `WorkItem`s from one shared queue and pushing `Outcome`s to the
// sink.
//
// Key architectural principles:
// 1.  **One Shared Queue**: All workers receive from the same bounded channel behind an
//     async mutex. Whoever holds the lock takes the next item, so every item is claimed
//     by exactly one worker; none are duplicated or dropped. Nothing is pre-assigned, so
//     a slow download never holds up items queued behind it.
// 2.  **Strict Item Lifecycle**: Inside a worker, fetch precedes decode precedes tally
//     precedes emission. Decode and tally are CPU bound and run on tokio's blocking pool
//     so they never stall the async workers that are waiting on the network.
// 3.  **Backpressure**: Emitting an outcome waits for room in the bounded result
//     channel, so a slow sink throttles the workers, which in turn throttle the reader.
// 4.  **Orderly Shutdown**: A worker exits when the queue is closed and drained, when
//     the sink has gone away, or when the run is cancelled. On cancellation an in-flight
//     item is abandoned at its next suspension point and produces no outcome.

use crate::core_modules::color_tally::tally;
use crate::core_modules::fetcher::{FormatPolicy, ImageFetcher, decode_image};
use crate::core_modules::input::WorkItem;
use crate::core_modules::sink::{Outcome, ResultRecord};
use crate::error::{DecodeError, ItemError, PipelineError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 10;

type SharedQueue = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// A fixed-size set of workers draining one shared work queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<u64>>,
}

impl WorkerPool {
    /// Spawns `concurrency` workers (at least one) on the current runtime.
    pub fn spawn<F>(
        concurrency: usize,
        queue: mpsc::Receiver<WorkItem>,
        outcomes: mpsc::Sender<Outcome>,
        fetcher: Arc<F>,
        format_policy: FormatPolicy,
        cancel: CancellationToken,
    ) -> Self
    where
        F: ImageFetcher + 'static,
    {
        let queue: SharedQueue = Arc::new(Mutex::new(queue));
        let workers = (0..concurrency.max(1))
            .map(|worker_id| {
                tokio::spawn(Self::worker_loop(
                    worker_id,
                    queue.clone(),
                    outcomes.clone(),
                    fetcher.clone(),
                    format_policy,
                    cancel.clone(),
                ))
            })
            .collect();
        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker to exit and returns how many items they processed.
    pub async fn join(self) -> Result<u64, PipelineError> {
        let mut processed = 0;
        for result in futures::future::join_all(self.workers).await {
            processed += result?;
        }
        Ok(processed)
    }

    async fn worker_loop<F: ImageFetcher>(
        worker_id: usize,
        queue: SharedQueue,
        outcomes: mpsc::Sender<Outcome>,
        fetcher: Arc<F>,
        format_policy: FormatPolicy,
        cancel: CancellationToken,
    ) -> u64 {
        let mut processed = 0;
        loop {
            let next = {
                let mut queue = queue.lock().await;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    item = queue.recv() => item,
                }
            };
            let Some(item) = next else { break };
            let line = item.line;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(worker_id, line, "abandoning in-flight item");
                    break;
                }
                outcome = process_item(fetcher.as_ref(), item, format_policy) => outcome,
            };
            processed += 1;

            if outcomes.send(outcome).await.is_err() {
                break;
            }
        }
        trace!(worker_id, processed, "worker exiting");
        processed
    }
}

/// Runs one item through fetch, decode and tally.
pub async fn process_item<F: ImageFetcher>(
    fetcher: &F,
    item: WorkItem,
    format_policy: FormatPolicy,
) -> Outcome {
    let started = Instant::now();
    let WorkItem { input, url, .. } = item;

    let body = match fetcher.fetch(&url).await {
        Ok(body) => body,
        Err(source) => return Outcome::Failed(ItemError::Fetch { url: input, source }),
    };

    let analyzed = tokio::task::spawn_blocking(move || {
        decode_image(&body, format_policy).map(|image| tally(&image))
    })
    .await
    .unwrap_or_else(|e| Err(DecodeError::Interrupted(e.to_string())));

    match analyzed {
        Ok(colors) => {
            debug!(url = %input, elapsed_ms = started.elapsed().as_millis() as u64, "item analyzed");
            Outcome::Completed(ResultRecord { url: input, colors })
        }
        Err(source) => Outcome::Failed(ItemError::Decode { url: input, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::fetcher::FetchedBody;
    use crate::error::FetchError;
    use image::{ImageEncoder, Rgba, RgbaImage};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Serves one solid-color PNG for every URL, failing those containing "missing".
    struct SolidFetcher {
        png: Vec<u8>,
        calls: AtomicUsize,
    }

    impl SolidFetcher {
        fn new() -> Self {
            let image = RgbaImage::from_pixel(4, 4, Rgba([12, 34, 56, 255]));
            let mut png = Vec::new();
            image::codecs::png::PngEncoder::new(&mut png)
                .write_image(image.as_raw(), 4, 4, image::ExtendedColorType::Rgba8)
                .expect("Error encoding PNG.");
            Self {
                png,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ImageFetcher for SolidFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedBody, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if url.path().contains("missing") {
                return Err(FetchError::Status(404));
            }
            Ok(FetchedBody::new(self.png.clone(), Some("image/png")))
        }
    }

    fn work_item(line: usize, input: &str) -> WorkItem {
        WorkItem {
            line,
            input: input.to_string(),
            url: Url::parse(input).unwrap(),
        }
    }

    #[tokio::test]
    async fn processes_an_item_end_to_end() {
        let outcome = process_item(&SolidFetcher::new(), work_item(1, "http://x/a.png"), FormatPolicy::Sniff).await;
        match outcome {
            Outcome::Completed(record) => {
                assert_eq!(record.url, "http://x/a.png");
                assert_eq!(record.colors.get(0).unwrap().count, 16);
                assert_eq!(record.colors.get(0).unwrap().key.to_string(), "#0c2238");
            }
            Outcome::Failed(error) => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn fetch_failures_become_item_errors() {
        let outcome = process_item(&SolidFetcher::new(), work_item(1, "http://x/missing.png"), FormatPolicy::Sniff).await;
        assert!(matches!(
            outcome,
            Outcome::Failed(ItemError::Fetch { source: FetchError::Status(404), .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_item_is_claimed_exactly_once() {
        let fetcher = Arc::new(SolidFetcher::new());
        let (queue_tx, queue_rx) = mpsc::channel(2);
        let (outcome_tx, mut outcome_rx) = mpsc::channel(2);
        let pool = WorkerPool::spawn(3, queue_rx, outcome_tx, fetcher.clone(), FormatPolicy::Sniff, CancellationToken::new());
        assert_eq!(pool.size(), 3);

        let producer = tokio::spawn(async move {
            for i in 0..40 {
                let path = if i % 7 == 0 { "missing" } else { "ok" };
                queue_tx.send(work_item(i, &format!("http://x/{path}/{i}"))).await.unwrap();
            }
        });

        let mut seen = HashSet::new();
        let mut failures = 0;
        while let Some(outcome) = outcome_rx.recv().await {
            let url = match outcome {
                Outcome::Completed(record) => record.url,
                Outcome::Failed(error) => {
                    failures += 1;
                    error.subject().to_string()
                }
            };
            assert!(seen.insert(url), "duplicate outcome");
        }

        producer.await.unwrap();
        assert_eq!(pool.join().await.unwrap(), 40);
        assert_eq!(seen.len(), 40);
        assert_eq!(failures, 6);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs_one_worker() {
        let (_queue_tx, queue_rx) = mpsc::channel::<WorkItem>(1);
        let (outcome_tx, _outcome_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(0, queue_rx, outcome_tx, Arc::new(SolidFetcher::new()), FormatPolicy::Sniff, cancel.clone());
        assert_eq!(pool.size(), 1);

        cancel.cancel();
        assert_eq!(pool.join().await.unwrap(), 0);
    }
}
