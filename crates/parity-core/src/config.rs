//! Configuration sources and collection options
//!
//! The pipeline does not own a configuration grammar. It consumes any
//! [`ConfigSource`] that yields named [`ConfigSection`]s: the section name is
//! the handler type tag, the required `name` field the instance name, and the
//! remaining entries are passed to the handler's own parser.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Key of the required instance-name field
pub const NAME_KEY: &str = "name";

/// One named configuration section as key/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl ConfigSection {
    /// Create an empty section
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Builder-style entry insertion
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Append an entry. Later entries shadow earlier ones on lookup.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Section identity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a value that must be present
    pub fn required(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::missing_field(key, &self.name))
    }

    /// Look up and parse a value
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    Error::Configuration(format!(
                        "Cannot parse {key}='{raw}' in section {}: {e}",
                        self.name
                    ))
                })
            })
            .transpose()
    }

    /// Look up a comma or whitespace separated list
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All entries in file order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the section has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.name)?;
        for (key, value) in &self.entries {
            writeln!(f, "{key} = {value}")?;
        }
        Ok(())
    }
}

/// A sequence of named configuration sections
pub trait ConfigSource {
    /// Content preceding the first section, if any
    fn preamble(&mut self) -> Option<ConfigSection> {
        None
    }

    /// The next section, `None` when exhausted. An `Err` marks one unreadable
    /// section; callers keep reading after it.
    fn next_section(&mut self) -> Option<Result<ConfigSection>>;
}

/// In-memory configuration source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    preamble: Option<ConfigSection>,
    sections: VecDeque<std::result::Result<ConfigSection, String>>,
}

impl MemorySource {
    /// Create a source yielding the given sections in order
    pub fn new(sections: impl IntoIterator<Item = ConfigSection>) -> Self {
        Self {
            preamble: None,
            sections: sections.into_iter().map(Ok).collect(),
        }
    }

    /// Attach preamble content
    pub fn with_preamble(mut self, preamble: ConfigSection) -> Self {
        self.preamble = Some(preamble);
        self
    }

    /// Queue a section that fails to read
    pub fn push_unreadable(&mut self, reason: impl Into<String>) {
        self.sections.push_back(Err(reason.into()));
    }
}

impl ConfigSource for MemorySource {
    fn preamble(&mut self) -> Option<ConfigSection> {
        self.preamble.take()
    }

    fn next_section(&mut self) -> Option<Result<ConfigSection>> {
        self.sections
            .pop_front()
            .map(|s| s.map_err(Error::Configuration))
    }
}

/// Configuration source backed by a JSON document
///
/// Accepts either an array of handler objects or an object of the form
/// `{"preamble": {...}, "handlers": [...]}`. Each handler object must carry a
/// `"type"` key; every other key becomes a section entry.
#[derive(Debug, Clone, Default)]
pub struct JsonMapSource {
    preamble: Option<ConfigSection>,
    items: VecDeque<serde_json::Value>,
    position: usize,
}

impl JsonMapSource {
    /// Parse a JSON map document
    pub fn parse(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Read a JSON map file
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let value: serde_json::Value = serde_json::from_reader(std::io::BufReader::new(file))?;
        Self::from_value(value)
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Array(items) => Ok(Self {
                preamble: None,
                items: items.into(),
                position: 0,
            }),
            serde_json::Value::Object(mut map) => {
                let preamble = match map.remove("preamble") {
                    Some(serde_json::Value::Object(fields)) => {
                        let mut section = ConfigSection::new("preamble");
                        for (key, value) in &fields {
                            section.insert(key.clone(), json_scalar(value));
                        }
                        Some(section)
                    }
                    _ => None,
                };
                match map.remove("handlers") {
                    Some(serde_json::Value::Array(items)) => Ok(Self {
                        preamble,
                        items: items.into(),
                        position: 0,
                    }),
                    _ => Err(Error::Configuration(
                        "JSON map must contain a \"handlers\" array".to_string(),
                    )),
                }
            }
            _ => Err(Error::Configuration(
                "JSON map must be an array or an object".to_string(),
            )),
        }
    }
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(json_scalar).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

impl ConfigSource for JsonMapSource {
    fn preamble(&mut self) -> Option<ConfigSection> {
        self.preamble.take()
    }

    fn next_section(&mut self) -> Option<Result<ConfigSection>> {
        let item = self.items.pop_front()?;
        self.position += 1;
        let serde_json::Value::Object(fields) = item else {
            return Some(Err(Error::Configuration(format!(
                "entry {} is not an object",
                self.position
            ))));
        };
        let Some(type_tag) = fields.get("type").and_then(|t| t.as_str()) else {
            return Some(Err(Error::Configuration(format!(
                "entry {} has no type",
                self.position
            ))));
        };
        let mut section = ConfigSection::new(type_tag);
        for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "type") {
            section.insert(key.clone(), json_scalar(value));
        }
        Some(Ok(section))
    }
}

/// Turns the configured map-file path into a configuration source
pub trait MapFileOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ConfigSource>>;
}

impl<F> MapFileOpener for F
where
    F: Fn(&Path) -> Result<Box<dyn ConfigSource>>,
{
    fn open(&self, path: &Path) -> Result<Box<dyn ConfigSource>> {
        self(path)
    }
}

/// Opens map files as JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMapFileOpener;

impl MapFileOpener for JsonMapFileOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ConfigSource>> {
        Ok(Box::new(JsonMapSource::from_path(path)?))
    }
}

/// Options controlling which handlers a collection loads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ArrayOptions {
    /// Map file with the handlers to include
    #[serde(alias = "datahandlers")]
    pub map_file: Option<PathBuf>,
    /// Handler types to disable
    #[serde(alias = "DataHandler.disable-by-type")]
    pub disable_by_type: Vec<String>,
    /// Handler names to disable
    #[serde(alias = "DataHandler.disable-by-name")]
    pub disable_by_name: Vec<String>,
    /// Print running averages after computing them
    #[serde(alias = "print-runningsum")]
    pub print_running_sum: bool,
}

impl ArrayOptions {
    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_lookup() {
        let section = ConfigSection::new("Combiner")
            .with("name", "combiner_a")
            .with("weights", "1.0, 2.0 3.0")
            .with("name", "combiner_b");

        assert_eq!(section.name(), "Combiner");
        assert_eq!(section.required("name").unwrap(), "combiner_b");
        assert!(matches!(section.required("priority"), Err(Error::Configuration(_))));
        assert_eq!(section.get_list("weights"), vec!["1.0", "2.0", "3.0"]);
        assert!(section.get_list("missing").is_empty());
        assert_eq!(section.entries().count(), 3);
    }

    #[test]
    fn test_section_parsed() {
        let section = ConfigSection::new("Correlator").with("order", "2").with("bad", "x");
        assert_eq!(section.get_parsed::<usize>("order").unwrap(), Some(2));
        assert_eq!(section.get_parsed::<usize>("missing").unwrap(), None);
        assert!(section.get_parsed::<usize>("bad").is_err());
    }

    #[test]
    fn test_section_display() {
        let section = ConfigSection::new("Combiner").with("name", "c");
        assert_eq!(section.to_string(), "[Combiner]\nname = c\n");
    }

    #[test]
    fn test_memory_source() {
        let mut source = MemorySource::new([ConfigSection::new("A"), ConfigSection::new("B")])
            .with_preamble(ConfigSection::new("preamble").with("run", "42"));
        source.push_unreadable("truncated");

        assert_eq!(source.preamble().unwrap().get("run"), Some("42"));
        assert!(source.preamble().is_none());
        assert_eq!(source.next_section().unwrap().unwrap().name(), "A");
        assert_eq!(source.next_section().unwrap().unwrap().name(), "B");
        assert!(source.next_section().unwrap().is_err());
        assert!(source.next_section().is_none());
    }

    #[test]
    fn test_json_source_array() {
        let mut source = JsonMapSource::parse(
            r#"[
                {"type": "Combiner", "name": "c1", "weights": [1, 2.5]},
                42,
                {"name": "orphan"},
                {"type": "Correlator", "name": "k1", "enabled": true}
            ]"#,
        )
        .unwrap();

        let first = source.next_section().unwrap().unwrap();
        assert_eq!(first.name(), "Combiner");
        assert_eq!(first.get("name"), Some("c1"));
        assert_eq!(first.get("weights"), Some("1,2.5"));
        assert!(first.get("type").is_none());

        assert!(source.next_section().unwrap().is_err());
        assert!(source.next_section().unwrap().is_err());

        let last = source.next_section().unwrap().unwrap();
        assert_eq!(last.get("enabled"), Some("true"));
        assert!(source.next_section().is_none());
    }

    #[test]
    fn test_json_source_object() {
        let mut source = JsonMapSource::parse(
            r#"{"preamble": {"comment": "test"}, "handlers": [{"type": "Combiner", "name": "c"}]}"#,
        )
        .unwrap();
        assert_eq!(source.preamble().unwrap().get("comment"), Some("test"));
        assert!(source.next_section().unwrap().is_ok());

        assert!(JsonMapSource::parse(r#"{"sections": []}"#).is_err());
        assert!(JsonMapSource::parse("3").is_err());
    }

    #[test]
    fn test_options_defaults() {
        let options = ArrayOptions::from_json("{}").unwrap();
        assert_eq!(options, ArrayOptions::default());
        assert!(options.map_file.is_none());
        assert!(!options.print_running_sum);
    }

    #[test]
    fn test_options_aliases() {
        let options = ArrayOptions::from_json(
            r#"{
                "datahandlers": "prex_datahandlers.json",
                "DataHandler.disable-by-type": ["Correlator"],
                "disable-by-name": ["c2"],
                "print-runningsum": true
            }"#,
        )
        .unwrap();
        assert_eq!(options.map_file, Some(PathBuf::from("prex_datahandlers.json")));
        assert_eq!(options.disable_by_type, vec!["Correlator"]);
        assert_eq!(options.disable_by_name, vec!["c2"]);
        assert!(options.print_running_sum);
    }
}
