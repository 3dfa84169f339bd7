//! Output sink interfaces
//!
//! The collection never defines an output schema. It fans each call out to
//! its handlers in order, and each handler decides what to write.

/// Tree-structured output writer
pub trait TreeWriter {
    /// Declare a scalar branch
    fn construct_branch(&mut self, tree: &str, branch: &str);

    /// Write the current value of a branch
    fn fill_branch(&mut self, tree: &str, branch: &str, value: f64);
}

/// Relational database writer
pub trait DatabaseWriter {
    /// Store one summary row for a handler
    fn fill_row(&mut self, category: &str, handler: &str, quantity: &str, value: f64, error: f64);
}

/// End-of-run summary report
pub trait PromptSummary {
    /// Record one summary element
    fn set_element(&mut self, category: &str, element: &str, value: f64, error: f64, width: f64);
}

/// In-memory [`TreeWriter`] that records branches and filled values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTree {
    pub branches: Vec<(String, String)>,
    pub fills: Vec<(String, String, f64)>,
}

impl TreeWriter for MemoryTree {
    fn construct_branch(&mut self, tree: &str, branch: &str) {
        self.branches.push((tree.to_string(), branch.to_string()));
    }

    fn fill_branch(&mut self, tree: &str, branch: &str, value: f64) {
        self.fills.push((tree.to_string(), branch.to_string(), value));
    }
}

/// One row stored by [`MemoryDatabase`]
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRow {
    pub category: String,
    pub handler: String,
    pub quantity: String,
    pub value: f64,
    pub error: f64,
}

/// In-memory [`DatabaseWriter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryDatabase {
    pub rows: Vec<DatabaseRow>,
}

impl DatabaseWriter for MemoryDatabase {
    fn fill_row(&mut self, category: &str, handler: &str, quantity: &str, value: f64, error: f64) {
        self.rows.push(DatabaseRow {
            category: category.to_string(),
            handler: handler.to_string(),
            quantity: quantity.to_string(),
            value,
            error,
        });
    }
}

/// One element stored by [`MemorySummary`]
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryElement {
    pub category: String,
    pub element: String,
    pub value: f64,
    pub error: f64,
    pub width: f64,
}

/// In-memory [`PromptSummary`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySummary {
    pub elements: Vec<SummaryElement>,
}

impl PromptSummary for MemorySummary {
    fn set_element(&mut self, category: &str, element: &str, value: f64, error: f64, width: f64) {
        self.elements.push(SummaryElement {
            category: category.to_string(),
            element: element.to_string(),
            value,
            error,
            width,
        });
    }
}
