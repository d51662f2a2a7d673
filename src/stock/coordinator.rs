//! Stock computation entry point
//!
//! Resolves the caller's visible roots and the reference axes, fans out one
//! blocking worker per (root, axis) plus one unitless and one consumable
//! worker per root, and waits for all of them before assembling the tree.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DEFAULT_MAX_DEPTH};

use super::aggregator::{Aggregator, Measure, StockContext};
use super::error::{StockError, StockResult};
use super::store::StockStore;
use super::tree::StoreLocationStock;

#[derive(Debug, Clone)]
pub struct StockOptions {
    pub max_depth: usize,
    pub timeout: Option<Duration>,
    /// Cancelling this token stops every worker at its next store location
    pub cancel: CancellationToken,
}

impl Default for StockOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl From<&Config> for StockOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_depth: config.max_depth,
            timeout: config.timeout,
            cancel: CancellationToken::new(),
        }
    }
}

/// Compute the stock of a product at every store location the person can see.
///
/// Returns the visible root locations, each carrying its full sub-tree and,
/// per node, one stock entry per reference axis followed by the unitless and
/// consumable entries.
///
/// # Errors
/// - `Visibility` when the visible roots cannot be resolved. The legacy
///   inventory answered this case with an empty list; here it is an error so
///   callers (and the MCP tool, which returns an error object) can tell
///   "nothing visible" from "could not decide what is visible". A person with
///   no read permission still gets `Ok` with an empty list.
/// - `HierarchyCycle` / `DepthExceeded` when the location tree is malformed.
/// - `Cancelled` when the token fires or the timeout elapses first. The
///   timeout covers root resolution as well as the walks.
pub async fn compute_stock<S: StockStore>(
    store: S,
    product_id: i64,
    person_id: i64,
    options: StockOptions,
) -> StockResult<Vec<StoreLocationStock>> {
    let started = Instant::now();
    if options.cancel.is_cancelled() {
        return Err(StockError::Cancelled);
    }

    let cancel = options.cancel.child_token();
    let timer = options.timeout.map(|limit| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            tracing::warn!("Stock computation exceeded {:?}, cancelling", limit);
            cancel.cancel();
        })
    });

    let outcome = run(store, product_id, person_id, options.max_depth, cancel).await;

    if let Some(timer) = timer {
        timer.abort();
    }

    match outcome {
        Ok(Outcome {
            roots,
            axes,
            workers,
            locations,
        }) => {
            tracing::info!(
                product_id,
                person_id,
                roots = roots.len(),
                axes,
                workers,
                locations,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stock computed"
            );
            Ok(roots)
        }
        Err(err) => {
            tracing::warn!(
                "Stock computation for product {} failed after {} ms: {}",
                product_id,
                started.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

struct Outcome {
    roots: Vec<StoreLocationStock>,
    axes: usize,
    workers: usize,
    locations: usize,
}

async fn run<S: StockStore>(
    store: S,
    product_id: i64,
    person_id: i64,
    max_depth: usize,
    cancel: CancellationToken,
) -> StockResult<Outcome> {
    let ctx = Arc::new(StockContext::new(store, product_id, max_depth, cancel.clone()));

    let resolving = {
        let ctx = Arc::clone(&ctx);
        tokio::task::spawn_blocking(move || ctx.resolve(person_id))
    };
    // The blocking query cannot be interrupted, but the caller stops waiting on it
    let (roots, axes) = tokio::select! {
        resolved = resolving => resolved??,
        _ = cancel.cancelled() => return Err(StockError::Cancelled),
    };
    if cancel.is_cancelled() {
        return Err(StockError::Cancelled);
    }

    let mut workers = JoinSet::new();
    for root in &roots {
        let measures = axes
            .iter()
            .cloned()
            .map(Measure::Quantity)
            .chain([Measure::Unitless, Measure::Consumable]);

        for measure in measures {
            let ctx = Arc::clone(&ctx);
            let root = root.clone();
            workers.spawn_blocking(move || Aggregator::new(&ctx, measure).run(&root));
        }
    }
    let worker_count = workers.len();

    let mut failure: Option<StockError> = None;
    while let Some(joined) = workers.join_next().await {
        let err = match joined {
            Ok(Ok(_total)) => continue,
            Ok(Err(e)) => e,
            Err(e) => StockError::Join(e),
        };

        // A malformed tree fails the whole call; stop the remaining walks early
        if !matches!(err, StockError::Cancelled) {
            cancel.cancel();
        }
        failure = match failure {
            Some(StockError::Cancelled) | None => Some(err),
            kept => kept,
        };
    }

    if let Some(err) = failure {
        return Err(err);
    }

    let tree = ctx.take_tree();
    let locations = tree.len();

    Ok(Outcome {
        roots: tree.into_roots(),
        axes: axes.len(),
        workers: worker_count,
        locations,
    })
}
