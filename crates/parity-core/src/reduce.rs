//! Folding per-worker handler collections into an aggregate
//!
//! Each worker drives its own [`HandlerArray`] through a batch of events.
//! Afterwards the partial collections are combined with the type-checked
//! merge protocol. The aggregator must not be merged into from two places at
//! once; taking it by `&mut` here makes that the caller's borrow to hold.

use crate::array::{HandlerArray, MergeReport, SlotError};
use crate::error::Error;
use tracing::{debug, error};

/// Summary of folding several partial collections
#[derive(Debug, Default)]
pub struct ReduceSummary {
    /// Partials whose slots were merged (fully or partly)
    pub folded: usize,
    /// Partials rejected because their shape differed from the aggregator
    pub rejected: Vec<(usize, Error)>,
    /// Per-slot mismatches, tagged with the partial they came from
    pub mismatched: Vec<(usize, SlotError)>,
}

impl ReduceSummary {
    /// Whether every partial merged without a single skipped slot
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.mismatched.is_empty()
    }

    fn record(&mut self, partial: usize, outcome: crate::Result<MergeReport>) {
        match outcome {
            Ok(report) => {
                self.folded += 1;
                self.mismatched
                    .extend(report.mismatched.into_iter().map(|slot| (partial, slot)));
            }
            Err(e) => {
                error!(partial, error = %e, "Rejected partial handler collection");
                self.rejected.push((partial, e));
            }
        }
    }
}

/// Fold every partial collection into `aggregator`, in order
pub fn reduce_into<'a, I>(aggregator: &mut HandlerArray, partials: I) -> ReduceSummary
where
    I: IntoIterator<Item = &'a HandlerArray>,
{
    let mut summary = ReduceSummary::default();
    for (index, partial) in partials.into_iter().enumerate() {
        debug!(partial = index, handlers = partial.len(), "Folding partial handler collection");
        summary.record(index, aggregator.accumulate_from(partial));
    }
    summary
}

/// Tree-reduce owned partial collections on the rayon pool
///
/// Returns `None` for an empty input. Partials that cannot be merged into
/// their neighbour are logged and dropped from the result.
#[cfg(feature = "parallel")]
pub fn par_reduce(partials: Vec<HandlerArray>) -> Option<HandlerArray> {
    use rayon::prelude::*;

    partials.into_par_iter().reduce_with(|mut left, right| {
        if let Err(e) = left.accumulate_from(&right) {
            error!(error = %e, "Dropping partial handler collection during parallel reduce");
        }
        left
    })
}
