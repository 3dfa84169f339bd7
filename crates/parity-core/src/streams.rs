//! Measurement streams consumed by data handlers
//!
//! Each event the upstream source publishes three channel groups (yield,
//! asymmetry and difference) plus an event error flag. Handlers resolve the
//! channels they need once, at connection time, into [`ChannelRef`] handles
//! and read values through them every event.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Event error flag value meaning "good event"
pub const GOOD_EVENT: u32 = 0;

/// The three channel groups a handler can bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Yield,
    Asymmetry,
    Difference,
}

impl StreamKind {
    /// All stream kinds in canonical order
    pub const ALL: [StreamKind; 3] = [StreamKind::Yield, StreamKind::Asymmetry, StreamKind::Difference];

    /// Short name used in configuration files and branch prefixes
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yield => "yield",
            Self::Asymmetry => "asym",
            Self::Difference => "diff",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yield" | "yld" => Ok(Self::Yield),
            "asym" | "asymmetry" => Ok(Self::Asymmetry),
            "diff" | "difference" => Ok(Self::Difference),
            other => Err(Error::Channel(format!("unknown stream kind '{other}'"))),
        }
    }
}

/// A named group of per-event channel values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelGroup {
    names: Vec<String>,
    values: Vec<f64>,
}

impl ChannelGroup {
    /// Create an empty channel group
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group from channel names, all values initialised to zero
    pub fn with_channels<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let values = vec![0.0; names.len()];
        Self { names, values }
    }

    /// Add a channel and return its index. Adding an existing name returns
    /// the existing index.
    pub fn add_channel(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(index) = self.index_of(&name) {
            return index;
        }
        self.names.push(name);
        self.values.push(0.0);
        self.values.len() - 1
    }

    /// Index of a channel by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Value at a resolved index
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Value of a channel by name
    pub fn value_by_name(&self, name: &str) -> Option<f64> {
        self.index_of(name).and_then(|i| self.value(i))
    }

    /// Set a channel value by name
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| Error::Channel(format!("no channel named '{name}'")))?;
        self.values[index] = value;
        Ok(())
    }

    /// Overwrite all values at once, in channel order
    pub fn set_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(Error::size_mismatch(self.values.len(), values.len(), "channel group values"));
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    /// Channel names in index order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the group has no channels
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Resolved, non-owning reference to one channel of the streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRef {
    pub kind: StreamKind,
    pub index: usize,
}

/// The per-event output of the upstream measurement source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementStreams {
    #[serde(rename = "yield")]
    pub yields: ChannelGroup,
    pub asymmetry: ChannelGroup,
    pub difference: ChannelGroup,
    error_flag: u32,
}

impl MeasurementStreams {
    /// Create streams with no channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Create streams where all three groups carry the same channel names
    pub fn with_channels<S: AsRef<str>>(names: &[S]) -> Self {
        let group = ChannelGroup::with_channels(names.iter().map(|n| n.as_ref().to_string()));
        Self {
            yields: group.clone(),
            asymmetry: group.clone(),
            difference: group,
            error_flag: GOOD_EVENT,
        }
    }

    /// Borrow a channel group
    pub fn group(&self, kind: StreamKind) -> &ChannelGroup {
        match kind {
            StreamKind::Yield => &self.yields,
            StreamKind::Asymmetry => &self.asymmetry,
            StreamKind::Difference => &self.difference,
        }
    }

    /// Mutably borrow a channel group
    pub fn group_mut(&mut self, kind: StreamKind) -> &mut ChannelGroup {
        match kind {
            StreamKind::Yield => &mut self.yields,
            StreamKind::Asymmetry => &mut self.asymmetry,
            StreamKind::Difference => &mut self.difference,
        }
    }

    /// Resolve a channel name within a group
    pub fn resolve(&self, kind: StreamKind, name: &str) -> Result<ChannelRef> {
        self.group(kind)
            .index_of(name)
            .map(|index| ChannelRef { kind, index })
            .ok_or_else(|| Error::Channel(format!("no channel named '{name}' in {kind} stream")))
    }

    /// Read a resolved channel
    pub fn value(&self, channel: ChannelRef) -> Result<f64> {
        self.group(channel.kind).value(channel.index).ok_or_else(|| {
            Error::Channel(format!(
                "channel index {} out of range for {} stream",
                channel.index, channel.kind
            ))
        })
    }

    /// Event error flag for the current event
    pub fn error_flag(&self) -> u32 {
        self.error_flag
    }

    /// Set the event error flag for the current event
    pub fn set_error_flag(&mut self, flag: u32) {
        self.error_flag = flag;
    }

    /// Whether the current event passed all event cuts
    pub fn is_good_event(&self) -> bool {
        self.error_flag == GOOD_EVENT
    }
}

/// Shared handle to the measurement source
///
/// The upstream source writes each event through [`SharedStreams::write`];
/// the handler collection takes one read lock per pipeline step.
#[derive(Debug, Clone, Default)]
pub struct SharedStreams(Arc<RwLock<MeasurementStreams>>);

impl SharedStreams {
    /// Wrap measurement streams in a shared handle
    pub fn new(streams: MeasurementStreams) -> Self {
        Self(Arc::new(RwLock::new(streams)))
    }

    /// Lock for reading
    pub fn read(&self) -> Result<RwLockReadGuard<'_, MeasurementStreams>> {
        self.0
            .read()
            .map_err(|e| Error::Streams(format!("Failed to lock measurement streams: {e}")))
    }

    /// Lock for writing
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, MeasurementStreams>> {
        self.0
            .write()
            .map_err(|e| Error::Streams(format!("Failed to lock measurement streams: {e}")))
    }

    /// Whether two handles point at the same source
    pub fn same_source(&self, other: &SharedStreams) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<MeasurementStreams> for SharedStreams {
    fn from(streams: MeasurementStreams) -> Self {
        Self::new(streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_channel_group() {
        let mut group = ChannelGroup::with_channels(["bcm1", "bcm2"]);
        assert_eq!(group.len(), 2);
        assert_eq!(group.index_of("bcm2"), Some(1));
        assert_eq!(group.add_channel("bcm2"), 1);
        assert_eq!(group.add_channel("bpm4x"), 2);

        group.set("bcm1", 3.5).unwrap();
        assert_eq!(group.value_by_name("bcm1"), Some(3.5));
        assert!(group.set("missing", 1.0).is_err());
        assert!(group.set_values(&[1.0]).is_err());
        group.set_values(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(group.value(2), Some(3.0));
    }

    #[test]
    fn test_resolve_and_read() {
        let mut streams = MeasurementStreams::with_channels(&["md1", "md2"]);
        streams.asymmetry.set("md2", 0.25).unwrap();

        let channel = streams.resolve(StreamKind::Asymmetry, "md2").unwrap();
        assert_eq!(channel.index, 1);
        assert_relative_eq!(streams.value(channel).unwrap(), 0.25);

        assert!(matches!(
            streams.resolve(StreamKind::Yield, "md9"),
            Err(Error::Channel(_))
        ));
    }

    #[test]
    fn test_error_flag() {
        let mut streams = MeasurementStreams::new();
        assert!(streams.is_good_event());
        streams.set_error_flag(0x40);
        assert!(!streams.is_good_event());
        assert_eq!(streams.error_flag(), 0x40);
    }

    #[test]
    fn test_stream_kind_parse() {
        assert_eq!("asym".parse::<StreamKind>().unwrap(), StreamKind::Asymmetry);
        assert_eq!("Yield".parse::<StreamKind>().unwrap(), StreamKind::Yield);
        assert_eq!("difference".parse::<StreamKind>().unwrap(), StreamKind::Difference);
        assert!("bogus".parse::<StreamKind>().is_err());
    }

    #[test]
    fn test_shared_handle() {
        let shared = SharedStreams::new(MeasurementStreams::with_channels(&["a"]));
        let other = shared.clone();
        other.write().unwrap().set_error_flag(3);
        assert_eq!(shared.read().unwrap().error_flag(), 3);
        assert!(shared.same_source(&other));
        assert!(!shared.same_source(&SharedStreams::default()));
    }
}
