//! Running correlations between dependent and independent channels
//!
//! For every (dependent, independent) pair the correlator keeps a running
//! covariance; at the end of the run it turns them into regression slopes
//! and correlation coefficients.
//!
//! Section keys:
//! - `dependents`, `independents`: channel names (both required)
//! - `dependent-stream`: default `asym`
//! - `independent-stream`: default `diff`

use crate::running::{RunningCovariance, Summary};
use parity_core::prelude::*;
use parity_core::{ChannelRef, DatabaseWriter};
use tracing::{info, warn};

/// Type tag under which the correlator registers
pub const CORRELATOR: &str = "Correlator";

/// Regression result for one (dependent, independent) pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    pub dependent: String,
    pub independent: String,
    pub slope: Option<f64>,
    pub correlation: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct Correlator {
    name: String,
    run_label: String,
    dependent_stream: StreamKind,
    independent_stream: StreamKind,
    dependents: Vec<String>,
    independents: Vec<String>,
    dependent_channels: Vec<ChannelRef>,
    independent_channels: Vec<ChannelRef>,
    dv_values: Vec<f64>,
    iv_values: Vec<f64>,
    // dependent-major: pairs[d * independents.len() + i]
    pairs: Vec<RunningCovariance>,
    results: Vec<PairResult>,
    dependent_averages: Vec<Summary>,
}

impl Correlator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            run_label: String::new(),
            dependent_stream: StreamKind::Asymmetry,
            independent_stream: StreamKind::Difference,
            dependents: Vec::new(),
            independents: Vec::new(),
            dependent_channels: Vec::new(),
            independent_channels: Vec::new(),
            dv_values: Vec::new(),
            iv_values: Vec::new(),
            pairs: Vec::new(),
            results: Vec::new(),
            dependent_averages: Vec::new(),
        }
    }

    /// Factory constructor
    pub fn create(name: &str) -> Box<dyn DataHandler> {
        Box::new(Self::new(name))
    }

    /// Running covariance of one pair
    pub fn pair(&self, dependent: &str, independent: &str) -> Option<&RunningCovariance> {
        let d = self.dependents.iter().position(|n| n == dependent)?;
        let i = self.independents.iter().position(|n| n == independent)?;
        self.pairs.get(d * self.independents.len() + i)
    }

    /// Results of the last correlation calculation
    pub fn results(&self) -> &[PairResult] {
        &self.results
    }

    /// Running averages of the dependent channels
    pub fn dependent_averages(&self) -> &[Summary] {
        &self.dependent_averages
    }

    /// Number of accumulated events
    pub fn count(&self) -> u64 {
        self.pairs.first().map(RunningCovariance::count).unwrap_or(0)
    }

    fn check_compatible(&self, peer: &Self) -> Result<()> {
        if (peer.dependent_stream, peer.independent_stream)
            != (self.dependent_stream, self.independent_stream)
        {
            return Err(Error::incompatible(
                &self.name,
                format!(
                    "streams {}/{} vs {}/{}",
                    self.dependent_stream, self.independent_stream, peer.dependent_stream, peer.independent_stream
                ),
            ));
        }
        if peer.dependents != self.dependents || peer.independents != self.independents {
            return Err(Error::incompatible(
                &self.name,
                format!(
                    "pairs {:?} x {:?} vs {:?} x {:?}",
                    self.dependents, self.independents, peer.dependents, peer.independents
                ),
            ));
        }
        if peer.pairs.len() != self.pairs.len() {
            return Err(Error::size_mismatch(self.pairs.len(), peer.pairs.len(), "correlator pairs"));
        }
        Ok(())
    }
}

impl DataHandler for Correlator {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &'static str {
        CORRELATOR
    }

    fn families(&self) -> &'static [&'static str] {
        &["Regression"]
    }

    fn set_run_label(&mut self, run_label: &str) {
        self.run_label = run_label.to_string();
    }

    fn parse_config(&mut self, section: &ConfigSection) -> Result<()> {
        let dependents = section.get_list("dependents");
        if dependents.is_empty() {
            return Err(Error::missing_field("dependents", section.name()));
        }
        let independents = section.get_list("independents");
        if independents.is_empty() {
            return Err(Error::missing_field("independents", section.name()));
        }
        let dependent_stream = section
            .get_parsed::<StreamKind>("dependent-stream")?
            .unwrap_or(self.dependent_stream);
        let independent_stream = section
            .get_parsed::<StreamKind>("independent-stream")?
            .unwrap_or(self.independent_stream);

        self.pairs = vec![RunningCovariance::new(); dependents.len() * independents.len()];
        self.dependents = dependents;
        self.independents = independents;
        self.dependent_stream = dependent_stream;
        self.independent_stream = independent_stream;
        Ok(())
    }

    fn connect_channels(&mut self, streams: &MeasurementStreams) -> Result<()> {
        self.dependent_channels.clear();
        self.independent_channels.clear();
        self.dependent_channels = self
            .dependents
            .iter()
            .map(|n| streams.resolve(self.dependent_stream, n))
            .collect::<Result<Vec<_>>>()?;
        self.independent_channels = self
            .independents
            .iter()
            .map(|n| streams.resolve(self.independent_stream, n))
            .collect::<Result<Vec<_>>>()?;
        self.dv_values = vec![0.0; self.dependents.len()];
        self.iv_values = vec![0.0; self.independents.len()];
        Ok(())
    }

    fn clear_event_data(&mut self) {
        self.dv_values.iter_mut().for_each(|v| *v = 0.0);
        self.iv_values.iter_mut().for_each(|v| *v = 0.0);
    }

    fn process_data(&mut self, streams: &MeasurementStreams) -> Result<()> {
        if self.dependent_channels.len() != self.dependents.len()
            || self.independent_channels.len() != self.independents.len()
        {
            return Err(Error::Channel(format!("{} is not connected to its channels", self.name)));
        }
        for (value, channel) in self.dv_values.iter_mut().zip(&self.dependent_channels) {
            *value = streams.value(*channel)?;
        }
        for (value, channel) in self.iv_values.iter_mut().zip(&self.independent_channels) {
            *value = streams.value(*channel)?;
        }
        Ok(())
    }

    fn accumulate_running_sum(&mut self) {
        let n_iv = self.iv_values.len();
        for (d, &y) in self.dv_values.iter().enumerate() {
            for (i, &x) in self.iv_values.iter().enumerate() {
                self.pairs[d * n_iv + i].push(x, y);
            }
        }
    }

    fn merge_running_sum(&mut self, peer: &dyn DataHandler) -> Result<()> {
        let peer = peer_as::<Self>(peer, self.type_tag())?;
        self.check_compatible(peer)?;
        for (mine, theirs) in self.pairs.iter_mut().zip(&peer.pairs) {
            mine.merge(theirs);
        }
        Ok(())
    }

    fn assign_from(&mut self, peer: &dyn DataHandler) -> Result<()> {
        let peer = peer_as::<Self>(peer, self.type_tag())?;
        self.check_compatible(peer)?;
        self.pairs.clone_from(&peer.pairs);
        self.dv_values.clone_from(&peer.dv_values);
        self.iv_values.clone_from(&peer.iv_values);
        self.results.clone_from(&peer.results);
        self.dependent_averages.clone_from(&peer.dependent_averages);
        Ok(())
    }

    fn calc_correlations(&mut self) {
        let n_iv = self.independents.len();
        self.results = self
            .pairs
            .iter()
            .enumerate()
            .map(|(k, cov)| PairResult {
                dependent: self.dependents[k / n_iv].clone(),
                independent: self.independents[k % n_iv].clone(),
                slope: cov.slope(),
                correlation: cov.correlation(),
                count: cov.count(),
            })
            .collect();
        for result in self.results.iter().filter(|r| r.slope.is_none()) {
            warn!(
                handler = %self.name,
                dependent = %result.dependent,
                independent = %result.independent,
                "Independent variable did not vary; no slope"
            );
        }
    }

    fn calculate_running_average(&mut self) {
        let n_iv = self.independents.len();
        self.dependent_averages = (0..self.dependents.len())
            .filter_map(|d| self.pairs.get(d * n_iv))
            .map(|cov| cov.y().summary())
            .collect();
    }

    fn print_running_average(&self) {
        for (name, avg) in self.dependents.iter().zip(&self.dependent_averages) {
            info!(
                handler = %self.name,
                dependent = %name,
                n = avg.count,
                mean = avg.mean,
                error = avg.error,
                "Running average"
            );
        }
    }

    fn print_value(&self) {
        for result in &self.results {
            info!(
                handler = %self.name,
                dependent = %result.dependent,
                independent = %result.independent,
                slope = ?result.slope,
                correlation = ?result.correlation,
                "Correlation"
            );
        }
    }

    fn clone_box(&self) -> Box<dyn DataHandler> {
        Box::new(self.clone())
    }

    fn fill_db(&self, db: &mut dyn DatabaseWriter, category: &str) {
        for result in &self.results {
            if let Some(slope) = result.slope {
                let quantity = format!("d{}/d{}", result.dependent, result.independent);
                db.fill_row(category, &self.name, &quantity, slope, 0.0);
            }
        }
    }
}
