//! Worker pool for paper enrichment.
//!
//! `num_workers` tasks share one job queue. Each job carries its paper's
//! index and a oneshot sender, so results can be written back into their
//! original slots regardless of completion order.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::enrich::{EnrichedPaper, Enricher, Paper};

/// Progress notifications emitted while a batch is enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        index: usize,
        total: usize,
        title: String,
    },
    Finished {
        index: usize,
        total: usize,
        title: String,
        method_found: bool,
        top_venue: bool,
    },
    /// The job was skipped because the run was cancelled.
    Cancelled {
        index: usize,
        total: usize,
        title: String,
    },
}

/// A paper enrichment job submitted to the pool.
pub struct EnrichJob {
    pub paper: Paper,
    pub index: usize,
    pub total: usize,
    pub result_tx: oneshot::Sender<EnrichedPaper>,
    pub progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

/// A pool of worker tasks that process enrichment jobs.
///
/// Submit jobs via [`submit()`](EnrichmentPool::submit), receive results via
/// the oneshot receiver paired with each job.
pub struct EnrichmentPool {
    job_tx: async_channel::Sender<EnrichJob>,
    pool_handle: JoinHandle<()>,
}

impl EnrichmentPool {
    /// Create a new pool with `num_workers` worker tasks (at least one).
    pub fn new(enricher: Arc<Enricher>, cancel: CancellationToken, num_workers: usize) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<EnrichJob>();

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(num_workers.max(1));
            for worker in 0..num_workers.max(1) {
                handles.push(tokio::spawn(worker_loop(
                    worker,
                    job_rx.clone(),
                    enricher.clone(),
                    cancel.clone(),
                )));
            }

            // Workers hold the remaining receivers and exit when job_tx closes.
            drop(job_rx);

            for h in handles {
                let _ = h.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    /// Get a cloneable sender for submitting jobs from multiple tasks.
    pub fn sender(&self) -> async_channel::Sender<EnrichJob> {
        self.job_tx.clone()
    }

    /// Submit a job to the pool.
    pub async fn submit(&self, job: EnrichJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the queue and wait for all workers to finish.
    pub async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

async fn worker_loop(
    worker: usize,
    job_rx: async_channel::Receiver<EnrichJob>,
    enricher: Arc<Enricher>,
    cancel: CancellationToken,
) {
    while let Ok(job) = job_rx.recv().await {
        let EnrichJob {
            paper,
            index,
            total,
            result_tx,
            progress,
        } = job;
        let title = paper.title.clone();

        // Cancelled jobs still get an answer so every slot is filled.
        if cancel.is_cancelled() {
            progress(ProgressEvent::Cancelled {
                index,
                total,
                title,
            });
            let _ = result_tx.send(cancelled(&enricher, paper));
            continue;
        }

        progress(ProgressEvent::Started {
            index,
            total,
            title: title.clone(),
        });
        tracing::debug!(worker, index, title = %title, "enriching paper");

        let fallback = paper.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            enriched = enricher.enrich(paper) => Some(enriched),
        };

        let result = match result {
            Some(enriched) => {
                progress(ProgressEvent::Finished {
                    index,
                    total,
                    title,
                    method_found: enriched.method.is_found(),
                    top_venue: enriched.venue.matched,
                });
                enriched
            }
            None => {
                progress(ProgressEvent::Cancelled {
                    index,
                    total,
                    title,
                });
                cancelled(&enricher, fallback)
            }
        };
        let _ = result_tx.send(result);
    }
}

fn cancelled(enricher: &Enricher, paper: Paper) -> EnrichedPaper {
    let venue = enricher.classify(&paper);
    EnrichedPaper {
        cancelled: true,
        ..EnrichedPaper::not_enriched(paper, venue)
    }
}

/// Enrich a batch of papers on a fresh pool and return the results in input
/// order.
pub async fn enrich_papers(
    enricher: Arc<Enricher>,
    papers: Vec<Paper>,
    num_workers: usize,
    cancel: CancellationToken,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
) -> Vec<EnrichedPaper> {
    let total = papers.len();
    let pool = EnrichmentPool::new(enricher.clone(), cancel, num_workers);

    let mut receivers = Vec::with_capacity(total);
    for (index, paper) in papers.iter().cloned().enumerate() {
        let (tx, rx) = oneshot::channel();
        pool.submit(EnrichJob {
            paper,
            index,
            total,
            result_tx: tx,
            progress: progress.clone(),
        })
        .await;
        receivers.push((index, rx));
    }

    let mut slots: Vec<Option<EnrichedPaper>> = vec![None; total];
    for (index, rx) in receivers {
        if let Ok(result) = rx.await {
            slots[index] = Some(result);
        }
    }

    pool.shutdown().await;

    slots
        .into_iter()
        .zip(papers)
        .map(|(slot, paper)| slot.unwrap_or_else(|| cancelled(&enricher, paper)))
        .collect()
}
