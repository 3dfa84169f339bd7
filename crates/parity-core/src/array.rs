//! The handler collection
//!
//! [`HandlerArray`] owns an ordered sequence of data handlers, decides which
//! configured handlers are allowed in, and drives their per-event and per-run
//! lifecycle. Insertion order is processing order.
//!
//! Every failure here is local: a bad configuration section, an unknown type
//! or a mismatched merge slot is logged and skipped, and the rest of the
//! collection keeps running.

use crate::config::{ArrayOptions, ConfigSection, ConfigSource, MapFileOpener, NAME_KEY};
use crate::error::{Error, Result};
use crate::factory::HandlerFactory;
use crate::handler::{is_of_family, DataHandler, BASE_FAMILY};
use crate::sinks::{DatabaseWriter, PromptSummary, TreeWriter};
use crate::streams::SharedStreams;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// A configuration section that did not produce a handler
#[derive(Debug)]
pub struct SkippedSection {
    pub type_tag: Option<String>,
    pub name: Option<String>,
    pub error: Error,
}

/// Outcome of loading handlers from a configuration source
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names of the handlers added, in order
    pub loaded: Vec<String>,
    /// Names of the handlers skipped by the disable lists
    pub disabled: Vec<String>,
    /// Sections that failed
    pub skipped: Vec<SkippedSection>,
}

impl LoadReport {
    fn skip(&mut self, type_tag: Option<&str>, name: Option<&str>, error: Error) {
        self.skipped.push(SkippedSection {
            type_tag: type_tag.map(str::to_string),
            name: name.map(str::to_string),
            error,
        });
    }

    /// Whether every section produced a handler or was deliberately disabled
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// A merge or assignment slot that was left untouched
#[derive(Debug)]
pub struct SlotError {
    pub slot: usize,
    pub name: String,
    pub error: Error,
}

/// Outcome of a pairwise merge or assignment
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Number of slots combined
    pub merged: usize,
    /// Slots skipped because the paired handlers did not match
    pub mismatched: Vec<SlotError>,
}

impl MergeReport {
    /// Whether every slot was combined
    pub fn is_complete(&self) -> bool {
        self.mismatched.is_empty()
    }
}

/// Owning, ordered collection of data handlers
#[derive(Clone)]
pub struct HandlerArray {
    handlers: Vec<Box<dyn DataHandler>>,
    map_file: Option<PathBuf>,
    disabled_by_name: BTreeSet<String>,
    disabled_by_type: BTreeSet<String>,
    accepted_families: Vec<String>,
    streams: Option<SharedStreams>,
    print_running_sum: bool,
    // slots whose process_data failed for the current event
    failed_slots: BTreeSet<usize>,
}

impl Default for HandlerArray {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            map_file: None,
            disabled_by_name: BTreeSet::new(),
            disabled_by_type: BTreeSet::new(),
            accepted_families: vec![BASE_FAMILY.to_string()],
            streams: None,
            print_running_sum: false,
            failed_slots: BTreeSet::new(),
        }
    }
}

impl HandlerArray {
    /// Create an empty collection accepting every handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection with the policy from `options`
    pub fn with_options(options: &ArrayOptions) -> Self {
        Self {
            map_file: options.map_file.clone(),
            disabled_by_name: options.disable_by_name.iter().cloned().collect(),
            disabled_by_type: options.disable_by_type.iter().cloned().collect(),
            print_running_sum: options.print_running_sum,
            ..Self::default()
        }
    }

    /// Create a collection from options and load the configured map file
    ///
    /// Without a map file the collection starts empty. A map file that cannot
    /// be opened is reported in the returned [`LoadReport`].
    pub fn from_options(
        options: &ArrayOptions,
        opener: &dyn MapFileOpener,
        factory: &HandlerFactory,
        streams: SharedStreams,
        run_label: &str,
    ) -> (Self, LoadReport) {
        let mut array = Self::with_options(options);
        array.streams = Some(streams.clone());

        let Some(path) = options.map_file.as_deref() else {
            return (array, LoadReport::default());
        };

        match opener.open(path) {
            Ok(mut source) => {
                info!(map_file = %path.display(), "Loading handlers");
                let report = array.load_from_configuration(source.as_mut(), factory, streams, run_label);
                (array, report)
            }
            Err(e) => {
                error!(map_file = %path.display(), error = %e, "Cannot open handler map file");
                let mut report = LoadReport::default();
                report.skip(None, None, e);
                (array, report)
            }
        }
    }

    /// Restrict the collection to handlers of the given families
    pub fn with_capability<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_families = families.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this collection can hold `handler`
    pub fn can_contain(&self, handler: &dyn DataHandler) -> bool {
        self.accepted_families
            .iter()
            .any(|family| is_of_family(handler, family))
    }

    /// Disable a handler type for subsequent loads
    pub fn disable_type(&mut self, type_tag: impl Into<String>) {
        self.disabled_by_type.insert(type_tag.into());
    }

    /// Disable a handler name for subsequent loads
    pub fn disable_name(&mut self, name: impl Into<String>) {
        self.disabled_by_name.insert(name.into());
    }

    /// Whether a `(type_tag, name)` pair is excluded by the disable lists
    pub fn is_disabled(&self, type_tag: &str, name: &str) -> bool {
        self.disabled_by_type.contains(type_tag) || self.disabled_by_name.contains(name)
    }

    /// Print running averages after computing them
    pub fn set_print_running_sum(&mut self, print: bool) {
        self.print_running_sum = print;
    }

    /// Map file this collection was configured from
    pub fn map_file(&self) -> Option<&Path> {
        self.map_file.as_deref()
    }

    /// Bind the measurement source used for processing and gating
    ///
    /// Every handler reconnects its channels against the new source, so a
    /// source with a different channel layout is safe to bind. Fails with the
    /// first connection error. The new source stays bound either way; a
    /// handler that could not connect fails processing and sits out
    /// accumulation.
    pub fn bind_streams(&mut self, streams: SharedStreams) -> Result<()> {
        let mut first_error = None;
        {
            let guard = streams.read()?;
            for handler in &mut self.handlers {
                if let Err(e) = handler.connect_channels(&guard) {
                    error!(handler = %handler.name(), error = %e, "Could not reconnect handler");
                    first_error.get_or_insert(e);
                }
            }
        }
        self.streams = Some(streams);
        self.failed_slots.clear();
        first_error.map_or(Ok(()), Err)
    }

    /// The bound measurement source
    pub fn streams(&self) -> Option<&SharedStreams> {
        self.streams.as_ref()
    }

    /// Create, wire and insert one handler per configuration section
    #[instrument(skip_all, fields(run = %run_label))]
    pub fn load_from_configuration(
        &mut self,
        source: &mut dyn ConfigSource,
        factory: &HandlerFactory,
        streams: SharedStreams,
        run_label: &str,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        self.streams = Some(streams.clone());

        if let Some(preamble) = source.preamble() {
            debug!("Preamble:\n{preamble}");
        }

        while let Some(next) = source.next_section() {
            let section = match next {
                Ok(section) => section,
                Err(e) => {
                    error!(error = %e, "Skipping unreadable configuration section");
                    report.skip(None, None, e);
                    continue;
                }
            };
            debug!("{section}");

            let type_tag = section.name();
            let name = match section.required(NAME_KEY) {
                Ok(name) => name,
                Err(e) => {
                    error!(handler_type = %type_tag, "No name defined in section for handler");
                    report.skip(Some(type_tag), None, e);
                    continue;
                }
            };

            if self.disabled_by_type.contains(type_tag) {
                warn!(handler_type = %type_tag, "DataHandler type disabled");
                report.disabled.push(name.to_string());
                continue;
            }
            if self.disabled_by_name.contains(name) {
                warn!(handler = %name, "DataHandler name disabled");
                report.disabled.push(name.to_string());
                continue;
            }

            info!(handler_type = %type_tag, handler = %name, "Creating handler");
            let mut handler = match factory.create(type_tag, name) {
                Ok(handler) => handler,
                Err(e) => {
                    error!(handler_type = %type_tag, error = %e, "Could not create handler");
                    report.skip(Some(type_tag), Some(name), e);
                    continue;
                }
            };

            if !self.can_contain(handler.as_ref()) {
                info!(handler = %name, "DataHandler cannot be stored in this handler array");
                report.skip(
                    Some(type_tag),
                    Some(name),
                    Error::CapabilityMismatch {
                        name: name.to_string(),
                        type_tag: type_tag.to_string(),
                    },
                );
                continue;
            }

            if let Err(e) = wire(handler.as_mut(), &section, &streams, run_label) {
                error!(handler = %name, error = %e, "Could not connect handler");
                report.skip(Some(type_tag), Some(name), e);
                continue;
            }

            match self.insert(Some(handler)) {
                Ok(()) => report.loaded.push(name.to_string()),
                Err(e) => report.skip(Some(type_tag), Some(name), e),
            }
        }

        info!(
            loaded = report.loaded.len(),
            disabled = report.disabled.len(),
            skipped = report.skipped.len(),
            "Finished loading handlers"
        );
        report
    }

    /// Add a handler, becoming its sole owner
    ///
    /// Rejects empty slots, duplicate names and handlers outside this
    /// collection's capability filter; a rejected insert leaves the
    /// collection unchanged.
    pub fn insert(&mut self, handler: Option<Box<dyn DataHandler>>) -> Result<()> {
        let Some(handler) = handler else {
            error!("HandlerArray::insert(): NULL handler");
            return Err(Error::NullHandler);
        };
        if self.find_by_name(handler.name()).is_some() {
            error!(handler = %handler.name(), "HandlerArray::insert(): handler already exists");
            return Err(Error::DuplicateName(handler.name().to_string()));
        }
        if !self.can_contain(handler.as_ref()) {
            error!(
                handler = %handler.name(),
                "HandlerArray::insert(): handler is not supported by this handler array"
            );
            return Err(Error::CapabilityMismatch {
                name: handler.name().to_string(),
                type_tag: handler.type_tag().to_string(),
            });
        }
        self.handlers.push(handler);
        Ok(())
    }

    /// Add a handler that is known to be present
    pub fn push(&mut self, handler: Box<dyn DataHandler>) -> Result<()> {
        self.insert(Some(handler))
    }

    /// Last handler named `name`
    pub fn find_by_name(&self, name: &str) -> Option<&dyn DataHandler> {
        self.handlers
            .iter()
            .rev()
            .find(|h| h.name() == name)
            .map(|h| h.as_ref())
    }

    /// Mutable access to the last handler named `name`
    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut dyn DataHandler> {
        for handler in self.handlers.iter_mut().rev() {
            if handler.name() == name {
                return Some(handler.as_mut());
            }
        }
        None
    }

    /// Every handler of the runtime family `type_tag`, in collection order
    pub fn find_by_type(&self, type_tag: &str) -> Vec<&dyn DataHandler> {
        self.handlers
            .iter()
            .map(|h| h.as_ref())
            .filter(|h| HandlerFactory::inherits_from(*h, type_tag))
            .collect()
    }

    /// Handlers in processing order
    pub fn iter(&self) -> impl Iterator<Item = &dyn DataHandler> + '_ {
        self.handlers.iter().map(|h| h.as_ref())
    }

    /// Handler names in processing order
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the collection holds no handlers
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Reset per-event state before new raw data arrives
    pub fn clear_event_data(&mut self) {
        self.failed_slots.clear();
        for handler in &mut self.handlers {
            handler.clear_event_data();
        }
    }

    /// Run every handler's per-event processing step
    ///
    /// A failing handler is logged and the remaining handlers still run.
    /// Fails only when no measurement source is available.
    pub fn process_event(&mut self) -> Result<()> {
        if self.handlers.is_empty() {
            return Ok(());
        }
        let Some(shared) = self.streams.as_ref() else {
            return Err(Error::Streams("no measurement source bound".to_string()));
        };
        let streams = shared.read()?;
        self.failed_slots.clear();
        for (slot, handler) in self.handlers.iter_mut().enumerate() {
            if let Err(e) = handler.process_data(&streams) {
                error!(handler = %handler.name(), error = %e, "Handler failed to process event");
                self.failed_slots.insert(slot);
            }
        }
        Ok(())
    }

    /// Accumulate running sums if the current event is good
    ///
    /// Returns whether the handlers accumulated. Without a bound source the
    /// event cannot be judged and nothing accumulates. Handlers that failed
    /// to process the current event sit this accumulation out.
    pub fn accumulate_running_sum(&mut self) -> bool {
        let good = match self.streams.as_ref().map(SharedStreams::read) {
            Some(Ok(streams)) => streams.is_good_event(),
            Some(Err(e)) => {
                error!(error = %e, "Cannot read event error flag");
                false
            }
            None => {
                warn!("No measurement source bound; skipping accumulation");
                false
            }
        };
        if good {
            for (slot, handler) in self.handlers.iter_mut().enumerate() {
                if self.failed_slots.contains(&slot) {
                    debug!(handler = %handler.name(), "Skipping accumulation after failed processing");
                    continue;
                }
                handler.accumulate_running_sum();
            }
        }
        good
    }

    /// Fold another collection's running sums into this one, slot by slot
    ///
    /// An empty `other` is a no-op. Collections of different length are not
    /// merged at all. A slot whose handlers differ in type is skipped and
    /// reported while the remaining slots still merge.
    pub fn accumulate_from(&mut self, other: &HandlerArray) -> Result<MergeReport> {
        self.pairwise(other, "running sum merge", |mine, theirs| {
            mine.merge_running_sum(theirs)
        })
    }

    /// Same as [`accumulate_from`](Self::accumulate_from); kept for callers
    /// folding whole-run sums
    pub fn accumulate_all_from(&mut self, other: &HandlerArray) -> Result<MergeReport> {
        self.accumulate_from(other)
    }

    /// Overwrite each handler's state with a copy of the matching slot in
    /// `source`
    ///
    /// Same shape rules as [`accumulate_from`](Self::accumulate_from).
    pub fn assign_from(&mut self, source: &HandlerArray) -> Result<MergeReport> {
        self.pairwise(source, "assignment", |mine, theirs| mine.assign_from(theirs))
    }

    fn pairwise<F>(&mut self, other: &HandlerArray, context: &str, mut combine: F) -> Result<MergeReport>
    where
        F: FnMut(&mut dyn DataHandler, &dyn DataHandler) -> Result<()>,
    {
        let mut report = MergeReport::default();
        if other.is_empty() {
            return Ok(report);
        }
        if self.len() != other.len() {
            error!(
                expected = self.len(),
                actual = other.len(),
                "HandlerArray {context}: array sizes don't match"
            );
            return Err(Error::size_mismatch(self.len(), other.len(), context));
        }

        for (slot, (mine, theirs)) in self.handlers.iter_mut().zip(&other.handlers).enumerate() {
            match combine(mine.as_mut(), theirs.as_ref()) {
                Ok(()) => report.merged += 1,
                Err(e) => {
                    error!(
                        slot,
                        handler = %mine.name(),
                        error = %e,
                        "HandlerArray {context}: handlers don't match"
                    );
                    report.mismatched.push(SlotError {
                        slot,
                        name: mine.name().to_string(),
                        error: e,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Compute running averages, then print them if requested
    pub fn calculate_running_average(&mut self) {
        for handler in &mut self.handlers {
            handler.calculate_running_average();
        }
        if self.print_running_sum {
            for handler in &self.handlers {
                handler.print_running_average();
            }
        }
    }

    /// Process one entry and accumulate it if the event is good
    pub fn process_entry(&mut self) -> Result<bool> {
        self.process_event()?;
        Ok(self.accumulate_running_sum())
    }

    /// End-of-run step: correlations, then running averages
    pub fn finish(&mut self) {
        for handler in &mut self.handlers {
            handler.calc_correlations();
        }
        self.calculate_running_average();
    }

    /// Report every handler's current values
    pub fn print_value(&self) {
        for handler in &self.handlers {
            handler.print_value();
        }
    }

    /// Declare tree branches for every handler
    pub fn construct_tree_branches(&mut self, tree: &mut dyn TreeWriter) {
        for handler in &mut self.handlers {
            handler.construct_tree_branches(tree);
        }
    }

    /// Fill tree branches for every handler
    pub fn fill_tree_branches(&self, tree: &mut dyn TreeWriter) {
        for handler in &self.handlers {
            handler.fill_tree_branches(tree);
        }
    }

    /// Reserve flat branch vector slots for every handler
    pub fn construct_branch_and_vector(&mut self, prefix: &str, values: &mut Vec<f64>) {
        for handler in &mut self.handlers {
            handler.construct_branch_and_vector(prefix, values);
        }
    }

    /// Fill the flat branch vector for every handler
    pub fn fill_tree_vector(&self, values: &mut [f64]) {
        for handler in &self.handlers {
            handler.fill_tree_vector(values);
        }
    }

    /// Write run results for every handler
    pub fn fill_db(&self, db: &mut dyn DatabaseWriter, category: &str) {
        for handler in &self.handlers {
            handler.fill_db(db, category);
        }
    }

    /// Write the summary report; only combining handlers contribute
    pub fn write_prompt_summary(&self, summary: &mut dyn PromptSummary, category: &str) {
        for handler in self.handlers.iter().filter(|h| h.name().contains("combine")) {
            handler.write_prompt_summary(summary, category);
        }
    }
}

impl std::fmt::Debug for HandlerArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerArray")
            .field("handlers", &self.names())
            .field("map_file", &self.map_file)
            .field("disabled_by_name", &self.disabled_by_name)
            .field("disabled_by_type", &self.disabled_by_type)
            .field("print_running_sum", &self.print_running_sum)
            .finish()
    }
}

fn wire(
    handler: &mut dyn DataHandler,
    section: &ConfigSection,
    streams: &SharedStreams,
    run_label: &str,
) -> Result<()> {
    handler.set_run_label(run_label);
    handler.parse_config(section)?;
    handler.load_channel_map()?;
    let streams = streams.read()?;
    handler.connect_channels(&streams)
}
