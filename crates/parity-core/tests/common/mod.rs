//! Shared mock handlers for integration tests

#![allow(dead_code)]

use parity_core::prelude::*;
use parity_core::AsAny;

/// Counts every lifecycle call it receives
#[derive(Debug, Clone, Default)]
pub struct Tally {
    pub name: String,
    pub processed: u64,
    pub count: u64,
    pub averaged: u64,
    pub correlated: u64,
    pub printed: u64,
    pub run_label: String,
}

impl Tally {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_count(name: &str, count: u64) -> Box<dyn DataHandler> {
        Box::new(Self {
            count,
            ..Self::new(name)
        })
    }

    pub fn create(name: &str) -> Box<dyn DataHandler> {
        Box::new(Self::new(name))
    }
}

impl DataHandler for Tally {
    fn name(&self) -> &str {
        &self.name
    }
    fn type_tag(&self) -> &'static str {
        "Tally"
    }
    fn families(&self) -> &'static [&'static str] {
        &["Counter"]
    }
    fn set_run_label(&mut self, run_label: &str) {
        self.run_label = run_label.to_string();
    }
    fn connect_channels(&mut self, _streams: &MeasurementStreams) -> Result<()> {
        Ok(())
    }
    fn process_data(&mut self, _streams: &MeasurementStreams) -> Result<()> {
        self.processed += 1;
        Ok(())
    }
    fn accumulate_running_sum(&mut self) {
        self.count += 1;
    }
    fn merge_running_sum(&mut self, peer: &dyn DataHandler) -> Result<()> {
        self.count += peer_as::<Self>(peer, self.type_tag())?.count;
        Ok(())
    }
    fn assign_from(&mut self, peer: &dyn DataHandler) -> Result<()> {
        self.count = peer_as::<Self>(peer, self.type_tag())?.count;
        Ok(())
    }
    fn calc_correlations(&mut self) {
        self.correlated += 1;
    }
    fn calculate_running_average(&mut self) {
        self.averaged += 1;
    }
    fn print_running_average(&self) {}
    fn clone_box(&self) -> Box<dyn DataHandler> {
        Box::new(self.clone())
    }
}

/// A second, unrelated handler type
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    pub name: String,
    pub level: f64,
}

impl Gauge {
    pub fn create(name: &str) -> Box<dyn DataHandler> {
        Box::new(Self {
            name: name.to_string(),
            level: 0.0,
        })
    }
}

impl DataHandler for Gauge {
    fn name(&self) -> &str {
        &self.name
    }
    fn type_tag(&self) -> &'static str {
        "Gauge"
    }
    fn connect_channels(&mut self, _streams: &MeasurementStreams) -> Result<()> {
        Ok(())
    }
    fn process_data(&mut self, _streams: &MeasurementStreams) -> Result<()> {
        Ok(())
    }
    fn accumulate_running_sum(&mut self) {
        self.level += 1.0;
    }
    fn merge_running_sum(&mut self, peer: &dyn DataHandler) -> Result<()> {
        self.level += peer_as::<Self>(peer, self.type_tag())?.level;
        Ok(())
    }
    fn assign_from(&mut self, peer: &dyn DataHandler) -> Result<()> {
        self.level = peer_as::<Self>(peer, self.type_tag())?.level;
        Ok(())
    }
    fn calculate_running_average(&mut self) {}
    fn clone_box(&self) -> Box<dyn DataHandler> {
        Box::new(self.clone())
    }
}

/// Fails to process every event while `broken` is set
#[derive(Debug, Clone, Default)]
pub struct Faulty {
    pub name: String,
    pub broken: bool,
    pub count: u64,
}

impl Faulty {
    pub fn create(name: &str) -> Box<dyn DataHandler> {
        Box::new(Self {
            name: name.to_string(),
            broken: true,
            count: 0,
        })
    }
}

impl DataHandler for Faulty {
    fn name(&self) -> &str {
        &self.name
    }
    fn type_tag(&self) -> &'static str {
        "Faulty"
    }
    fn connect_channels(&mut self, _streams: &MeasurementStreams) -> Result<()> {
        Ok(())
    }
    fn process_data(&mut self, _streams: &MeasurementStreams) -> Result<()> {
        if self.broken {
            return Err(Error::Channel(format!("{} lost its channels", self.name)));
        }
        Ok(())
    }
    fn accumulate_running_sum(&mut self) {
        self.count += 1;
    }
    fn merge_running_sum(&mut self, peer: &dyn DataHandler) -> Result<()> {
        self.count += peer_as::<Self>(peer, self.type_tag())?.count;
        Ok(())
    }
    fn assign_from(&mut self, peer: &dyn DataHandler) -> Result<()> {
        self.count = peer_as::<Self>(peer, self.type_tag())?.count;
        Ok(())
    }
    fn calculate_running_average(&mut self) {}
    fn clone_box(&self) -> Box<dyn DataHandler> {
        Box::new(self.clone())
    }
}

pub fn factory() -> HandlerFactory {
    HandlerFactory::new()
        .with("Tally", Tally::create)
        .with("Gauge", Gauge::create)
}

pub fn tally(array: &HandlerArray, name: &str) -> Tally {
    array
        .find_by_name(name)
        .and_then(|h| h.as_any().downcast_ref::<Tally>())
        .cloned()
        .expect("tally handler")
}

pub fn faulty(array: &HandlerArray, name: &str) -> Faulty {
    array
        .find_by_name(name)
        .and_then(|h| h.as_any().downcast_ref::<Faulty>())
        .cloned()
        .expect("faulty handler")
}

pub fn gauge(array: &HandlerArray, name: &str) -> Gauge {
    array
        .find_by_name(name)
        .and_then(|h| h.as_any().downcast_ref::<Gauge>())
        .cloned()
        .expect("gauge handler")
}

pub fn bound_array() -> (HandlerArray, SharedStreams) {
    let streams = SharedStreams::new(MeasurementStreams::new());
    let mut array = HandlerArray::new();
    array.bind_streams(streams.clone()).unwrap();
    (array, streams)
}
