//! Weighted linear combination of channels
//!
//! Section keys:
//! - `inputs`: channel names to combine (required)
//! - `weights`: one weight per input, default 1.0 each
//! - `stream`: channel group to read, default `asym`
//! - `output`: name of the combined quantity, default the handler name

use crate::running::{RunningStat, Summary};
use parity_core::prelude::*;
use parity_core::{ChannelRef, DatabaseWriter, PromptSummary, TreeWriter};
use tracing::info;

/// Type tag under which the combiner registers
pub const COMBINER: &str = "Combiner";

const TREE: &str = "handlers";

#[derive(Debug, Clone)]
pub struct Combiner {
    name: String,
    run_label: String,
    stream: StreamKind,
    output: String,
    inputs: Vec<String>,
    weights: Vec<f64>,
    channels: Vec<ChannelRef>,
    current: f64,
    running: RunningStat,
    average: Option<Summary>,
    vector_offset: Option<usize>,
}

impl Combiner {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            run_label: String::new(),
            stream: StreamKind::Asymmetry,
            output: name.to_string(),
            inputs: Vec::new(),
            weights: Vec::new(),
            channels: Vec::new(),
            current: 0.0,
            running: RunningStat::new(),
            average: None,
            vector_offset: None,
        }
    }

    /// Factory constructor
    pub fn create(name: &str) -> Box<dyn DataHandler> {
        Box::new(Self::new(name))
    }

    /// Combined value of the current event
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Running statistics of the combined value
    pub fn running(&self) -> &RunningStat {
        &self.running
    }

    /// Result of the last running-average calculation
    pub fn average(&self) -> Option<&Summary> {
        self.average.as_ref()
    }

    /// Name of the combined quantity
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Run label assigned at wiring time
    pub fn run_label(&self) -> &str {
        &self.run_label
    }

    fn check_compatible(&self, peer: &Self) -> Result<()> {
        if peer.stream != self.stream {
            return Err(Error::incompatible(
                &self.name,
                format!("stream {} vs {}", self.stream, peer.stream),
            ));
        }
        if peer.inputs != self.inputs {
            return Err(Error::incompatible(
                &self.name,
                format!("inputs {:?} vs {:?}", self.inputs, peer.inputs),
            ));
        }
        if peer.weights != self.weights {
            return Err(Error::incompatible(
                &self.name,
                format!("weights {:?} vs {:?}", self.weights, peer.weights),
            ));
        }
        Ok(())
    }
}

impl DataHandler for Combiner {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        COMBINER
    }

    fn families(&self) -> &'static [&'static str] {
        &["LinearCombination"]
    }

    fn set_run_label(&mut self, run_label: &str) {
        self.run_label = run_label.to_string();
    }

    fn parse_config(&mut self, section: &ConfigSection) -> Result<()> {
        let inputs = section.get_list("inputs");
        if inputs.is_empty() {
            return Err(Error::missing_field("inputs", section.name()));
        }

        let weights = section.get_list("weights");
        let weights = if weights.is_empty() {
            vec![1.0; inputs.len()]
        } else {
            weights
                .iter()
                .map(|w| {
                    w.parse::<f64>().map_err(|e| {
                        Error::Configuration(format!("Bad weight '{w}' for {}: {e}", self.name))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };
        if weights.len() != inputs.len() {
            return Err(Error::Configuration(format!(
                "{} has {} inputs but {} weights",
                self.name,
                inputs.len(),
                weights.len()
            )));
        }
        let stream = section.get_parsed::<StreamKind>("stream")?.unwrap_or(self.stream);

        self.inputs = inputs;
        self.weights = weights;
        self.stream = stream;
        if let Some(output) = section.get("output") {
            self.output = output.to_string();
        }
        Ok(())
    }

    fn connect_channels(&mut self, streams: &MeasurementStreams) -> Result<()> {
        self.channels.clear();
        self.channels = self
            .inputs
            .iter()
            .map(|input| streams.resolve(self.stream, input))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn clear_event_data(&mut self) {
        self.current = 0.0;
    }

    fn process_data(&mut self, streams: &MeasurementStreams) -> Result<()> {
        if self.channels.len() != self.inputs.len() {
            return Err(Error::Channel(format!("{} is not connected to its inputs", self.name)));
        }
        let mut sum = 0.0;
        for (channel, weight) in self.channels.iter().zip(&self.weights) {
            sum += weight * streams.value(*channel)?;
        }
        self.current = sum;
        Ok(())
    }

    fn accumulate_running_sum(&mut self) {
        self.running.push(self.current);
    }

    fn merge_running_sum(&mut self, peer: &dyn DataHandler) -> Result<()> {
        let peer = peer_as::<Self>(peer, self.type_tag())?;
        self.check_compatible(peer)?;
        self.running.merge(&peer.running);
        Ok(())
    }

    fn assign_from(&mut self, peer: &dyn DataHandler) -> Result<()> {
        let peer = peer_as::<Self>(peer, self.type_tag())?;
        self.check_compatible(peer)?;
        self.current = peer.current;
        self.running = peer.running;
        self.average = peer.average;
        Ok(())
    }

    fn calculate_running_average(&mut self) {
        self.average = Some(self.running.summary());
    }

    fn print_running_average(&self) {
        if let Some(avg) = &self.average {
            info!(
                handler = %self.name,
                output = %self.output,
                n = avg.count,
                mean = avg.mean,
                error = avg.error,
                width = avg.width,
                "Running average"
            );
        }
    }

    fn print_value(&self) {
        info!(handler = %self.name, output = %self.output, value = self.current, "Current value");
    }

    fn clone_box(&self) -> Box<dyn DataHandler> {
        Box::new(self.clone())
    }

    fn construct_tree_branches(&mut self, tree: &mut dyn TreeWriter) {
        tree.construct_branch(TREE, &self.output);
    }

    fn fill_tree_branches(&self, tree: &mut dyn TreeWriter) {
        tree.fill_branch(TREE, &self.output, self.current);
    }

    fn construct_branch_and_vector(&mut self, _prefix: &str, values: &mut Vec<f64>) {
        self.vector_offset = Some(values.len());
        values.push(0.0);
    }

    fn fill_tree_vector(&self, values: &mut [f64]) {
        if let Some(slot) = self.vector_offset.and_then(|i| values.get_mut(i)) {
            *slot = self.current;
        }
    }

    fn fill_db(&self, db: &mut dyn DatabaseWriter, category: &str) {
        if let Some(avg) = &self.average {
            db.fill_row(category, &self.name, &self.output, avg.mean, avg.error);
        }
    }

    fn write_prompt_summary(&self, summary: &mut dyn PromptSummary, category: &str) {
        if let Some(avg) = &self.average {
            summary.set_element(category, &self.output, avg.mean, avg.error, avg.width);
        }
    }
}
