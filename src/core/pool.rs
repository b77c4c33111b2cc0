/*!
 * Bounded worker pool for a batch.
 *
 * All jobs are queued up front on a channel sized to the batch, so
 * submission never blocks. `min(N, MAX_WORKERS)` workers drain the queue,
 * each running one pipeline at a time and sending exactly one outcome per
 * job. The calling thread aggregates outcomes as they arrive and returns once
 * it has received all `N`.
 */

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use super::aggregate::{Aggregator, BatchResult};
use super::pipeline::{FileOutcome, Pipeline};
use super::settings::{BatchSettings, FileJob};
use crate::catalog::Catalog;
use crate::error::{GeobatchError, Result};
use crate::geometry::RasterGeometry;

/// Upper bound on simultaneously running pipelines
pub const MAX_WORKERS: usize = 20;

/// Number of workers started for a batch of `jobs` files
pub fn worker_count(jobs: usize) -> usize {
    jobs.min(MAX_WORKERS)
}

/// Run the pipeline over every job and summarise the outcomes.
///
/// Individual file failures never abort the batch; only a pool that cannot
/// start (or loses its workers) yields an error.
pub fn run_batch(
    settings: &BatchSettings,
    jobs: Vec<FileJob>,
    catalog: &dyn Catalog,
    geometry: &dyn RasterGeometry,
) -> Result<BatchResult> {
    let total = jobs.len();
    let workers = worker_count(total);
    let mut aggregator = Aggregator::new(total);
    if workers == 0 {
        return Ok(aggregator.finish());
    }

    let (job_tx, job_rx) = bounded::<FileJob>(total);
    let (outcome_tx, outcome_rx) = bounded::<FileOutcome>(total);

    for job in jobs {
        job_tx
            .send(job)
            .map_err(|e| GeobatchError::Parallel(format!("job queue closed: {}", e)))?;
    }
    drop(job_tx);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("georef-worker-{}", i))
        .build()
        .map_err(|e| GeobatchError::Parallel(e.to_string()))?;

    info!(
        files = total,
        workers,
        reference_map = settings.reference_map(),
        "Starting georeference batch"
    );

    let pipeline = Pipeline::new(settings, catalog, geometry);

    pool.in_place_scope(|scope| {
        for id in 0..workers {
            let job_rx = job_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let pipeline = &pipeline;
            scope.spawn(move |_| worker(id, pipeline, job_rx, outcome_tx));
        }
        drop(outcome_tx);

        while !aggregator.is_complete() {
            match outcome_rx.recv() {
                Ok(outcome) => {
                    if let Some(ref e) = outcome.error {
                        warn!(file = %outcome.id, stage = e.stage(), error = %e, "File failed");
                    }
                    aggregator.record(outcome);
                }
                Err(_) => break,
            }
        }
    });

    if !aggregator.is_complete() {
        return Err(GeobatchError::Parallel(format!(
            "worker pool stopped after {} of {} files",
            aggregator.received(),
            total
        )));
    }

    let result = aggregator.finish();
    info!(
        success = result.success_count,
        fail = result.fail_count,
        "Georeference batch finished"
    );
    Ok(result)
}

fn worker(
    id: usize,
    pipeline: &Pipeline<'_>,
    jobs: Receiver<FileJob>,
    outcomes: Sender<FileOutcome>,
) {
    debug!(worker = id, "Worker started");
    for job in jobs {
        let outcome = pipeline.run(&job);
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}
