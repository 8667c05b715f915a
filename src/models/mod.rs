//! Domain models for Takeoff.
//!
//! # Core Concepts
//!
//! ## Catalog (long-lived reference data)
//!
//! - [`Template`]: a named, reusable group of construction tasks that
//!   applies under certain conditions (e.g. pile foundation on weak soil).
//! - [`TaskDefinition`]: one line item of work within a template, with a
//!   formula deriving its quantity from input parameters.
//! - [`Resource`] / [`ResourceLine`]: the standardized bill of
//!   materials, labor, and machine time required per unit of a task's
//!   quantity ("norm").
//!
//! The catalog is read-only to the engine; it is maintained by
//! administrative tooling outside this crate.
//!
//! ## Per-run data
//!
//! - [`ParameterSet`]: the caller's named numeric inputs for one run.
//! - [`EstimationTree`]: the computed estimate, a flat arena of
//!   [`EstimateNode`] rows linked by parent id.
//! - [`RunReport`]: what the run produced and which tasks it skipped.

mod parameter;
mod project;
mod report;
mod resource;
mod template;
mod tree;

pub use parameter::*;
pub use project::*;
pub use report::*;
pub use resource::*;
pub use template::*;
pub use tree::*;
