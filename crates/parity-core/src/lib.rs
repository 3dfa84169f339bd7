//! Core traits and types for the parity data-handler pipeline
//!
//! This crate provides the pluggable handler pipeline: a registry-driven
//! collection of polymorphic processing stages that consume per-event
//! measurement streams, accumulate cross-event statistics and merge with
//! sibling collections built by independent workers.
//!
//! # Architecture Overview
//!
//! 1. **Handlers** - [`DataHandler`] is the single capability interface
//! 2. **Factory** - [`HandlerFactory`] maps type tags to constructors
//! 3. **Collection** - [`HandlerArray`] owns handlers, applies the
//!    enable/disable policy and drives the event loop
//! 4. **Reduce** - [`reduce`] folds per-worker collections together
//!
//! # Example
//!
//! ```rust
//! use parity_core::prelude::*;
//! use parity_core::{AsAny, ChannelRef, MemorySource};
//!
//! /// Sums one asymmetry channel over good events
//! #[derive(Debug, Clone, Default)]
//! struct Sum {
//!     name: String,
//!     channel: Option<ChannelRef>,
//!     current: f64,
//!     total: f64,
//! }
//!
//! impl DataHandler for Sum {
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//!     fn type_tag(&self) -> &'static str {
//!         "Sum"
//!     }
//!     fn connect_channels(&mut self, streams: &MeasurementStreams) -> Result<()> {
//!         self.channel = Some(streams.resolve(StreamKind::Asymmetry, "md1")?);
//!         Ok(())
//!     }
//!     fn process_data(&mut self, streams: &MeasurementStreams) -> Result<()> {
//!         let channel = self.channel.ok_or_else(|| Error::Channel("md1 not connected".into()))?;
//!         self.current = streams.value(channel)?;
//!         Ok(())
//!     }
//!     fn accumulate_running_sum(&mut self) {
//!         self.total += self.current;
//!     }
//!     fn merge_running_sum(&mut self, peer: &dyn DataHandler) -> Result<()> {
//!         self.total += peer_as::<Sum>(peer, "Sum")?.total;
//!         Ok(())
//!     }
//!     fn assign_from(&mut self, peer: &dyn DataHandler) -> Result<()> {
//!         self.total = peer_as::<Sum>(peer, "Sum")?.total;
//!         Ok(())
//!     }
//!     fn calculate_running_average(&mut self) {}
//!     fn clone_box(&self) -> Box<dyn DataHandler> {
//!         Box::new(self.clone())
//!     }
//! }
//!
//! let factory = HandlerFactory::new().with("Sum", |name| {
//!     Box::new(Sum { name: name.to_string(), ..Sum::default() })
//! });
//! let mut source = MemorySource::new([ConfigSection::new("Sum").with("name", "md_sum")]);
//! let streams = SharedStreams::new(MeasurementStreams::with_channels(&["md1"]));
//!
//! let mut array = HandlerArray::new();
//! let report = array.load_from_configuration(&mut source, &factory, streams.clone(), "run_1");
//! assert_eq!(report.loaded, vec!["md_sum"]);
//!
//! for (value, flag) in [(1.0, 0), (2.0, 0), (50.0, 1)] {
//!     {
//!         let mut event = streams.write()?;
//!         event.asymmetry.set("md1", value)?;
//!         event.set_error_flag(flag);
//!     }
//!     array.clear_event_data();
//!     array.process_entry()?;
//! }
//! array.finish();
//!
//! let sum = array
//!     .find_by_name("md_sum")
//!     .and_then(|h| h.as_any().downcast_ref::<Sum>())
//!     .map(|s| s.total);
//! assert_eq!(sum, Some(3.0));
//! # Ok::<(), parity_core::Error>(())
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod factory;
pub mod handler;
pub mod reduce;
pub mod sinks;
pub mod streams;

// Re-export core types
pub use error::{Error, Result};

pub use array::{HandlerArray, LoadReport, MergeReport, SkippedSection, SlotError};
pub use config::{
    ArrayOptions, ConfigSection, ConfigSource, JsonMapFileOpener, JsonMapSource, MapFileOpener,
    MemorySource,
};
pub use factory::{HandlerConstructor, HandlerFactory};
pub use handler::{is_of_family, peer_as, AsAny, DataHandler, BASE_FAMILY};
pub use reduce::{reduce_into, ReduceSummary};
#[cfg(feature = "parallel")]
pub use reduce::par_reduce;
pub use sinks::{DatabaseWriter, PromptSummary, TreeWriter};
pub use streams::{ChannelGroup, ChannelRef, MeasurementStreams, SharedStreams, StreamKind, GOOD_EVENT};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        peer_as, ArrayOptions, ConfigSection, DataHandler, Error, HandlerArray, HandlerFactory,
        MeasurementStreams, Result, SharedStreams, StreamKind,
    };
}
