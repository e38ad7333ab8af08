//! Parallel execution of tree-building tasks.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{Span, debug, dispatcher, info};

use crate::error::ForestError;
use crate::rng::{RngStreams, Substream};
use crate::tree::{TreeBuilder, TreeTask};

/// Number of workers a build uses.
///
/// `requested == 0` means detected cores − 1. The result is clamped to
/// `[1, n_trees]`.
#[must_use]
pub fn resolve_workers(requested: usize, n_trees: usize) -> usize {
    resolve_workers_with(requested, n_trees, detected_cores())
}

fn detected_cores() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn resolve_workers_with(requested: usize, n_trees: usize, detected: usize) -> usize {
    let wanted = if requested == 0 {
        detected.saturating_sub(1)
    } else {
        requested
    };
    wanted.clamp(1, n_trees.max(1))
}

/// Run one task per substream and return the trees in task order.
///
/// The first failing task aborts the build; trees already built are
/// discarded. With a single worker, tasks run sequentially on the calling
/// thread. Pool workers log through the caller's subscriber and span.
pub(crate) fn dispatch<B: TreeBuilder>(
    builder: &B,
    task: &TreeTask<'_>,
    streams: RngStreams,
    workers: usize,
    progress: bool,
) -> Result<Vec<B::Tree>, ForestError> {
    let total = streams.len();
    let completed = AtomicUsize::new(0);

    let subscriber = dispatcher::get_default(Clone::clone);
    let span = Span::current();

    let run = |mut rng: Substream| -> Result<B::Tree, ForestError> {
        dispatcher::with_default(&subscriber, || {
            span.in_scope(|| {
                let tree = builder.build_tree(task, &mut rng)?;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if progress {
                    info!(completed = done, total, "tree built");
                }
                Ok(tree)
            })
        })
    };

    let substreams = streams.into_substreams();

    if workers <= 1 {
        debug!(total, "building trees sequentially");
        return substreams.into_iter().map(run).collect();
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("sporf-worker-{i}"))
        .build()
        .map_err(|e| ForestError::ThreadPool {
            workers,
            source: e,
        })?;

    debug!(total, workers, "building trees in parallel");
    pool.install(|| substreams.into_par_iter().map(run).collect())
}
