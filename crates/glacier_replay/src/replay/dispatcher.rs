//! Worker dispatch and phase synchronization
//!
//! Roots are split into contiguous chunks, one per worker. Every worker
//! parses its chunk, waits at the barrier, then creates its chunk. The
//! barrier is what makes cross-chunk `dependent_by` increments from the parse
//! phase visible to every worker's create phase.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info};

use super::control::{ControlBlock, StaticTotals};
use super::walker::{Replayer, RootOutcome};
use crate::database::entry::Entry;
use crate::database::format::ResourceTag;
use crate::database::Database;
use crate::foundation::scratch::PayloadScratch;
use crate::vulkan::device::ReplayDevice;

/// Dispatch options.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Worker thread count; 0 selects the detected hardware concurrency.
    pub thread_count: usize,
    /// Log replay progress once a second.
    pub show_progress: bool,
}

/// Per-pipeline-kind tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagTally {
    /// Graphics pipelines.
    pub graphics: u32,
    /// Compute pipelines.
    pub compute: u32,
    /// Ray-tracing pipelines.
    pub raytracing: u32,
}

impl TagTally {
    fn bump(&mut self, tag: ResourceTag) {
        match tag {
            ResourceTag::GraphicsPipeline => self.graphics += 1,
            ResourceTag::ComputePipeline => self.compute += 1,
            ResourceTag::RaytracingPipeline => self.raytracing += 1,
            _ => {}
        }
    }

    /// Sum across pipeline kinds.
    pub fn total(self) -> u32 {
        self.graphics + self.compute + self.raytracing
    }
}

/// Totals across all workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaySummary {
    /// Number of root pipelines in the database.
    pub roots: usize,
    /// Roots whose closures parsed cleanly.
    pub parsed: TagTally,
    /// Roots replayed through creation.
    pub created: TagTally,
    /// Roots whose subtree failed in either phase.
    pub failed: TagTally,
}

impl ReplaySummary {
    fn absorb(&mut self, other: WorkerSummary) {
        self.parsed.graphics += other.parsed.graphics;
        self.parsed.compute += other.parsed.compute;
        self.parsed.raytracing += other.parsed.raytracing;
        self.created.graphics += other.created.graphics;
        self.created.compute += other.created.compute;
        self.created.raytracing += other.created.raytracing;
        self.failed.graphics += other.failed.graphics;
        self.failed.compute += other.failed.compute;
        self.failed.raytracing += other.failed.raytracing;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerSummary {
    parsed: TagTally,
    created: TagTally,
    failed: TagTally,
}

struct Progress {
    parsed_roots: AtomicUsize,
    created_roots: AtomicUsize,
    done: AtomicBool,
}

/// Resolve the effective worker count; 0 means "detected concurrency".
pub fn effective_thread_count(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}

/// Replay every root pipeline in the database.
pub fn run(
    db: &Database,
    device: &dyn ReplayDevice,
    control: &ControlBlock,
    options: &ReplayOptions,
) -> ReplaySummary {
    let roots = db.store().root_pipelines();
    let thread_count = effective_thread_count(options.thread_count);
    info!(
        "replaying {} root pipelines on {} threads",
        roots.len(),
        thread_count
    );
    control.begin_replay(thread_count as u32, StaticTotals::from_store(db.store()));

    let barrier = Barrier::new(thread_count);
    let chunk_size = ((roots.len() + thread_count - 1) / thread_count).max(1);
    let progress = Arc::new(Progress {
        parsed_roots: AtomicUsize::new(0),
        created_roots: AtomicUsize::new(0),
        done: AtomicBool::new(false),
    });

    let mut summary = ReplaySummary {
        roots: roots.len(),
        ..ReplaySummary::default()
    };

    thread::scope(|scope| {
        let workers: Vec<_> = (0..thread_count)
            .map(|index| {
                let chunk = roots
                    .get(index * chunk_size..((index + 1) * chunk_size).min(roots.len()))
                    .unwrap_or(&[]);
                let barrier = &barrier;
                let progress = Arc::clone(&progress);
                scope.spawn(move || {
                    worker_run(index, chunk, db, device, control, barrier, &progress)
                })
            })
            .collect();

        if options.show_progress {
            let progress = Arc::clone(&progress);
            let total = roots.len();
            scope.spawn(move || {
                while !progress.done.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(1000));
                    info!(
                        "progress: {}/{} parsed, {}/{} created",
                        progress.parsed_roots.load(Ordering::Acquire),
                        total,
                        progress.created_roots.load(Ordering::Acquire),
                        total,
                    );
                }
            });
        }

        for worker in workers {
            match worker.join() {
                Ok(worker_summary) => summary.absorb(worker_summary),
                Err(_) => error!("a worker thread panicked; its chunk is unaccounted"),
            }
        }
        progress.done.store(true, Ordering::Release);
    });

    info!(
        "replay finished: {} created, {} failed out of {} roots",
        summary.created.total(),
        summary.failed.total(),
        summary.roots
    );
    summary
}

fn worker_run(
    index: usize,
    roots: &[Arc<Entry>],
    db: &Database,
    device: &dyn ReplayDevice,
    control: &ControlBlock,
    barrier: &Barrier,
    progress: &Progress,
) -> WorkerSummary {
    let replayer = Replayer::new(db, device, control);
    let mut scratch = PayloadScratch::new();
    let mut summary = WorkerSummary::default();
    let started = Instant::now();

    for root in roots {
        if replayer.parse_root(root, &mut scratch) {
            summary.parsed.bump(root.tag);
        } else {
            summary.failed.bump(root.tag);
        }
        progress.parsed_roots.fetch_add(1, Ordering::Release);
        control.heartbeat(index);
        scratch.reset_retain();
    }

    barrier.wait();

    for root in roots {
        match replayer.create_root(root, &mut scratch) {
            RootOutcome::Created => summary.created.bump(root.tag),
            RootOutcome::Failed => summary.failed.bump(root.tag),
            RootOutcome::Skipped => {}
        }
        progress.created_roots.fetch_add(1, Ordering::Release);
        control.heartbeat(index);
        scratch.reset_retain();
    }

    info!(
        "worker {index}: {} roots in {:?} ({} graphics, {} compute, {} raytracing created)",
        roots.len(),
        started.elapsed(),
        summary.created.graphics,
        summary.created.compute,
        summary.created.raytracing,
    );
    summary
}
