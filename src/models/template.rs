use serde::{Deserialize, Serialize};

use super::ResourceLine;

/// A named, reusable group of construction tasks.
///
/// Templates are selected per run by the rule table in
/// [`crate::engine::selector`] (e.g. pile foundation applies on weak
/// soil). Every task of a selected template lands under the template's
/// section label in the estimate tree; several templates may share one
/// section label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub code: String,
    pub name: String,
    /// Section label grouping this template's tasks in the estimate.
    pub section: String,
    pub tasks: Vec<TaskDefinition>,
}

/// One line item of work within a template.
///
/// The formula derives the task's quantity from the run's variable
/// bindings (raw parameters plus derived variables); the norm code keys
/// the task's resource bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub unit: String,
    pub norm_code: String,
    pub formula: String,
    pub position: i64,
    /// Resolved resource bill for `norm_code`, populated on catalog load.
    pub lines: Vec<ResourceLine>,
}
