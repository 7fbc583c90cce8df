//! Runs batch jobs on the calling thread or on a pool scoped to one call.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel;
use pcd_core::pointcloud::clip::ShapeClipper;
use pcd_core::pointcloud::point::PointCloud;
use pcd_parser::reader::TileReader;

use crate::extract::{BatchJob, BatchOutput};
use crate::progress::ProgressSink;
use crate::RoiError;

/// A batch whose tiles could not be loaded.
#[derive(Debug)]
pub struct BatchFailure {
    pub rois: Vec<String>,
    pub error: RoiError,
}

/// Everything the dispatcher collected, keyed by ROI name.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub subsets: HashMap<String, PointCloud>,
    pub failures: Vec<BatchFailure>,
    /// Set when a batch panicked; no new batches start after that.
    pub crash: Option<String>,
}

enum Completion {
    Done(BatchOutput),
    Failed(RoiError),
    Crashed(String),
}

impl DispatchOutcome {
    fn record(&mut self, job: &BatchJob, completion: Completion) {
        match completion {
            Completion::Done(output) => self.subsets.extend(output),
            Completion::Failed(error) => {
                log::warn!("batch {} failed: {error}", job.index);
                self.failures.push(BatchFailure {
                    rois: job.roi_names().map(String::from).collect(),
                    error,
                });
            }
            Completion::Crashed(message) => {
                log::error!("batch {} crashed: {message}", job.index);
                self.crash.get_or_insert(message);
            }
        }
    }
}

pub struct Dispatcher<'a> {
    reader: &'a dyn TileReader,
    clipper: &'a dyn ShapeClipper,
    progress: &'a dyn ProgressSink,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        reader: &'a dyn TileReader,
        clipper: &'a dyn ShapeClipper,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            reader,
            clipper,
            progress,
        }
    }

    /// Runs every job and blocks until all have returned or one crashed.
    pub fn run(&self, jobs: Vec<BatchJob>, workers: usize) -> Result<DispatchOutcome, RoiError> {
        let workers = workers.min(jobs.len());
        if workers > 1 && !self.reader.parallel_safe() {
            log::warn!("reader is not safe for concurrent use, running {} batches sequentially", jobs.len());
            return Ok(self.run_sequential(jobs));
        }
        if workers <= 1 {
            return Ok(self.run_sequential(jobs));
        }
        self.run_parallel(jobs, workers)
    }

    fn run_sequential(&self, jobs: Vec<BatchJob>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for job in jobs {
            let completion = self.guarded(&job, |name| self.progress.tick(Some(name)));
            outcome.record(&job, completion);
            if outcome.crash.is_some() {
                break;
            }
        }
        outcome
    }

    fn run_parallel(&self, jobs: Vec<BatchJob>, workers: usize) -> Result<DispatchOutcome, RoiError> {
        log::info!("dispatching {} batches to {workers} workers", jobs.len());

        let (job_tx, job_rx) = channel::unbounded::<BatchJob>();
        let (done_tx, done_rx) = channel::unbounded::<(BatchJob, Completion)>();
        for job in jobs {
            // the receiver is alive until the scope below ends
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let abort = AtomicBool::new(false);
        let scoped = crossbeam::thread::scope(|scope| -> Result<DispatchOutcome, RoiError> {
            for i in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let abort = &abort;
                scope
                    .builder()
                    .name(format!("roi-worker-{i}"))
                    .spawn(move |_| {
                        while !abort.load(Ordering::Acquire) {
                            let Ok(job) = job_rx.recv() else {
                                break;
                            };
                            let completion = self.guarded(&job, |_| {});
                            if matches!(completion, Completion::Crashed(_)) {
                                abort.store(true, Ordering::Release);
                            }
                            if done_tx.send((job, completion)).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|err| {
                        abort.store(true, Ordering::Release);
                        RoiError::PoolCreation(err)
                    })?;
            }
            drop(done_tx);

            let mut outcome = DispatchOutcome::default();
            for (job, completion) in done_rx.iter() {
                if let Completion::Done(output) = &completion {
                    for (name, _) in output {
                        self.progress.tick(Some(name));
                    }
                }
                outcome.record(&job, completion);
            }
            Ok(outcome)
        });

        // worker panics are caught per batch, so the scope itself only fails
        // if the collector loop above panicked
        scoped.map_err(|payload| RoiError::WorkerCrashed {
            message: panic_message(payload.as_ref()),
            partial: Box::default(),
        })?
    }

    fn guarded(&self, job: &BatchJob, on_roi: impl FnMut(&str)) -> Completion {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            job.run(self.reader, self.clipper, on_roi)
        }));
        match result {
            Ok(Ok(output)) => Completion::Done(output),
            Ok(Err(error)) => Completion::Failed(error),
            Err(payload) => Completion::Crashed(panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use pcd_core::crs::ReferenceSystem;
    use pcd_core::pointcloud::clip::PlanimetricClipper;
    use pcd_parser::reader::ReaderOptions;

    use super::*;
    use crate::coalesce::QueryBatch;
    use crate::progress::LogProgress;
    use crate::testing::{grid_tiles, CountingReader};
    use crate::Roi;

    fn jobs() -> Vec<BatchJob> {
        let tiles = grid_tiles(3, 1, 100.0);
        tiles
            .into_iter()
            .enumerate()
            .map(|(i, tile)| {
                let x = tile.bounds.min_x + 50.0;
                let batch = QueryBatch {
                    tiles: vec![tile],
                    rois: vec![
                        Roi::circle(format!("r{i}a"), x, 50.0, 3.0),
                        Roi::circle(format!("r{i}b"), x + 10.0, 50.0, 3.0),
                    ],
                };
                BatchJob::new(i, batch, &ReaderOptions::default(), ReferenceSystem::Epsg(26917))
            })
            .collect()
    }

    #[test]
    fn sequential_ticks_once_per_roi() {
        let reader = CountingReader::default();
        let progress = LogProgress::default();
        let outcome = Dispatcher::new(&reader, &PlanimetricClipper, &progress)
            .run(jobs(), 1)
            .unwrap();
        assert_eq!(progress.done(), 6);
        assert_eq!(outcome.subsets.len(), 6);
        assert_eq!(reader.call_count(), 3);
    }

    #[test]
    fn parallel_runs_every_batch_once() {
        let reader = CountingReader::default();
        let progress = LogProgress::default();
        let outcome = Dispatcher::new(&reader, &PlanimetricClipper, &progress)
            .run(jobs(), 4)
            .unwrap();
        assert_eq!(outcome.subsets.len(), 6);
        assert!(outcome.failures.is_empty());
        assert_eq!(reader.sorted_calls(), vec![vec![0], vec![1], vec![2]]);
        assert_eq!(progress.done(), 6);
    }

    #[test]
    fn failed_batch_does_not_stop_its_siblings() {
        for workers in [1, 3] {
            let reader = CountingReader {
                failing: [1].into(),
                ..Default::default()
            };
            let outcome = Dispatcher::new(&reader, &PlanimetricClipper, &LogProgress::default())
                .run(jobs(), workers)
                .unwrap();
            assert_eq!(outcome.subsets.len(), 4, "workers {workers}");
            assert_eq!(outcome.failures.len(), 1);
            assert_eq!(outcome.failures[0].rois, ["r1a", "r1b"]);
            assert!(outcome.crash.is_none());
        }
    }

    #[test]
    fn crash_keeps_finished_batches() {
        let reader = CountingReader {
            panicking: [2].into(),
            ..Default::default()
        };
        let outcome = Dispatcher::new(&reader, &PlanimetricClipper, &LogProgress::default())
            .run(jobs(), 1)
            .unwrap();
        assert!(outcome.crash.as_deref().unwrap().contains("blew up"));
        assert_eq!(outcome.subsets.len(), 4);
    }

    #[test]
    fn parallel_crash_drains_started_batches() {
        let reader = CountingReader {
            panicking: [2].into(),
            panic_after_calls: 3,
            ..Default::default()
        };
        let outcome = Dispatcher::new(&reader, &PlanimetricClipper, &LogProgress::default())
            .run(jobs(), 3)
            .unwrap();
        assert!(outcome.crash.as_deref().unwrap().contains("blew up"));
        let mut names: Vec<_> = outcome.subsets.keys().cloned().collect();
        names.sort();
        assert_eq!(names, ["r0a", "r0b", "r1a", "r1b"]);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn parallel_crash_stops_the_pool() {
        let reader = CountingReader {
            panicking: [0].into(),
            ..Default::default()
        };
        let outcome = Dispatcher::new(&reader, &PlanimetricClipper, &LogProgress::default())
            .run(jobs(), 2)
            .unwrap();
        assert!(outcome.crash.is_some());
        assert!(!outcome.subsets.contains_key("r0a"));
        assert!(!outcome.subsets.contains_key("r0b"));
        // whatever finished is kept whole
        assert_eq!(outcome.subsets.len() % 2, 0);
        assert!(reader.call_count() <= 3);
    }

    #[test]
    fn serial_only_reader_forces_sequential_mode() {
        let reader = CountingReader {
            serial_only: true,
            ..Default::default()
        };
        let outcome = Dispatcher::new(&reader, &PlanimetricClipper, &LogProgress::default())
            .run(jobs(), 8)
            .unwrap();
        assert_eq!(outcome.subsets.len(), 6);
        // sequential mode preserves batch order
        assert_eq!(*reader.calls.lock().unwrap(), vec![vec![0], vec![1], vec![2]]);
    }
}
