//! The data handler capability interface
//!
//! A data handler is a named processing stage that reads the per-event
//! measurement streams, accumulates cross-event statistics and can fold in the
//! accumulated state of a peer of the same concrete type. The handler
//! collection drives handlers only through this trait.

use crate::config::ConfigSection;
use crate::error::{Error, Result};
use crate::sinks::{DatabaseWriter, PromptSummary, TreeWriter};
use crate::streams::MeasurementStreams;
use std::any::Any;

/// Family every handler belongs to
pub const BASE_FAMILY: &str = "DataHandler";

/// Helper trait for types that can be downcast
///
/// Used by the merge protocol to recover a peer's concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Capability set of a pipeline stage
///
/// Only the identity, wiring, per-event and merge methods are required; output
/// and reporting hooks default to doing nothing.
pub trait DataHandler: AsAny + Send {
    /// Instance name, fixed at creation
    fn name(&self) -> &str;

    /// Type tag of the concrete variant, as registered with the factory
    fn type_tag(&self) -> &'static str;

    /// Additional families this variant belongs to, used by type queries and
    /// capability filters. [`BASE_FAMILY`] is implied.
    fn families(&self) -> &'static [&'static str] {
        &[]
    }

    /// Assign the label of the run being analysed
    fn set_run_label(&mut self, _run_label: &str) {}

    /// Parse the handler's own configuration section
    fn parse_config(&mut self, _section: &ConfigSection) -> Result<()> {
        Ok(())
    }

    /// Load any handler-specific channel mapping
    fn load_channel_map(&mut self) -> Result<()> {
        Ok(())
    }

    /// Resolve the named channels this handler reads
    fn connect_channels(&mut self, streams: &MeasurementStreams) -> Result<()>;

    /// Reset per-event transient state
    fn clear_event_data(&mut self) {}

    /// Process the current event
    fn process_data(&mut self, streams: &MeasurementStreams) -> Result<()>;

    /// Add the current event to the running sums
    fn accumulate_running_sum(&mut self);

    /// Fold a peer's running sums into this handler's
    ///
    /// Implementations must verify that `peer` has their own concrete type,
    /// see [`peer_as`], and return [`Error::TypeMismatch`] otherwise.
    fn merge_running_sum(&mut self, peer: &dyn DataHandler) -> Result<()>;

    /// Overwrite this handler's state with a copy of a peer's
    fn assign_from(&mut self, peer: &dyn DataHandler) -> Result<()>;

    /// End-of-run correlation step
    fn calc_correlations(&mut self) {}

    /// Turn running sums into averages
    fn calculate_running_average(&mut self);

    /// Report running averages
    fn print_running_average(&self) {}

    /// Report current values
    fn print_value(&self) {}

    /// Value copy behind a fresh box
    fn clone_box(&self) -> Box<dyn DataHandler>;

    /// Declare tree branches
    fn construct_tree_branches(&mut self, _tree: &mut dyn TreeWriter) {}

    /// Write current values to the tree
    fn fill_tree_branches(&self, _tree: &mut dyn TreeWriter) {}

    /// Reserve slots in a flat branch vector
    fn construct_branch_and_vector(&mut self, _prefix: &str, _values: &mut Vec<f64>) {}

    /// Write current values into previously reserved slots
    fn fill_tree_vector(&self, _values: &mut [f64]) {}

    /// Write run results to the database
    fn fill_db(&self, _db: &mut dyn DatabaseWriter, _category: &str) {}

    /// Write run results to the summary report
    fn write_prompt_summary(&self, _summary: &mut dyn PromptSummary, _category: &str) {}
}

impl Clone for Box<dyn DataHandler> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl std::fmt::Debug for dyn DataHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataHandler")
            .field("name", &self.name())
            .field("type_tag", &self.type_tag())
            .finish()
    }
}

/// Whether `handler` belongs to `family`
pub fn is_of_family(handler: &dyn DataHandler, family: &str) -> bool {
    family == BASE_FAMILY || handler.type_tag() == family || handler.families().contains(&family)
}

/// Recover a peer as the concrete type `T`
///
/// `expected` is the type tag of the receiving handler, used in the error.
pub fn peer_as<'a, T: 'static>(peer: &'a dyn DataHandler, expected: &str) -> Result<&'a T> {
    peer.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::type_mismatch(expected, peer.type_tag()))
}
