//! Derived variables computed from raw parameters.
//!
//! Formulas may reference the caller's raw inputs as well as a handful of
//! secondary quantities (floor area, perimeter, ...) derived here once
//! per run.

use std::collections::BTreeMap;

use crate::models::ParameterSet;

use super::EngineError;

/// Raw parameters every run must supply.
pub const REQUIRED: &[&str] = &["width", "length", "num_floors"];

/// Build the variable bindings for one run: all raw parameters plus the
/// derived quantities.
///
/// `total_height` is only bound when `floor_height` is supplied; a
/// formula referencing it without one fails for that task alone as an
/// unresolved variable.
pub fn bind(params: &ParameterSet) -> Result<BTreeMap<String, f64>, EngineError> {
    let missing: Vec<String> = REQUIRED
        .iter()
        .filter(|name| !params.contains(name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MissingParameters(missing));
    }

    let mut vars: BTreeMap<String, f64> =
        params.iter().map(|(name, value)| (name.clone(), *value)).collect();

    let width = vars["width"];
    let length = vars["length"];
    let num_floors = vars["num_floors"];

    let floor_area = width * length;
    vars.insert("floor_area".into(), floor_area);
    vars.insert("perimeter".into(), 2.0 * (width + length));
    vars.insert("total_floor_area".into(), floor_area * num_floors);
    if let Some(floor_height) = params.get("floor_height") {
        vars.insert("total_height".into(), floor_height * num_floors);
    }

    Ok(vars)
}
