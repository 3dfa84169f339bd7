//! Built-in data handlers for the parity analysis pipeline
//!
//! # Handlers
//!
//! - **Combiner**: weighted linear combination of channels with a running
//!   mean, error and width of the combined value
//! - **Correlator**: running regression of dependent channels against
//!   independent ones; slopes and correlation coefficients at the end of a run
//!
//! Both accumulate with [`RunningStat`]-style single-pass accumulators whose
//! state merges exactly, so per-worker collections fold into the same result
//! as a single pass.
//!
//! # Usage
//!
//! ```rust
//! use parity_core::{ConfigSection, HandlerArray, MeasurementStreams, MemorySource, SharedStreams};
//!
//! let factory = parity_handlers::builtin_factory();
//! let streams = SharedStreams::new(MeasurementStreams::with_channels(&["md1", "md2"]));
//! let mut source = MemorySource::new([ConfigSection::new("Combiner")
//!     .with("name", "combine_md")
//!     .with("inputs", "md1 md2")]);
//!
//! let mut array = HandlerArray::new();
//! let report = array.load_from_configuration(&mut source, &factory, streams.clone(), "run_1");
//! assert_eq!(report.loaded, vec!["combine_md"]);
//!
//! array.process_entry().unwrap();
//! array.finish();
//! ```

pub mod combiner;
pub mod correlator;
pub mod running;

pub use combiner::{Combiner, COMBINER};
pub use correlator::{Correlator, PairResult, CORRELATOR};
pub use running::{RunningCovariance, RunningStat, Summary};

use parity_core::HandlerFactory;

/// Register every built-in handler type
pub fn register_builtin(factory: &mut HandlerFactory) {
    factory.register(COMBINER, Combiner::create);
    factory.register(CORRELATOR, Correlator::create);
}

/// Factory with every built-in handler type registered
pub fn builtin_factory() -> HandlerFactory {
    let mut factory = HandlerFactory::new();
    register_builtin(&mut factory);
    factory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_factory() {
        let factory = builtin_factory();
        assert_eq!(factory.registered_types().collect::<Vec<_>>(), vec!["Combiner", "Correlator"]);

        let handler = factory.create(CORRELATOR, "corr").unwrap();
        assert_eq!(handler.name(), "corr");
        assert!(HandlerFactory::inherits_from(handler.as_ref(), "Regression"));
    }
}
