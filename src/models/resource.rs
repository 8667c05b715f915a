use serde::{Deserialize, Serialize};

/// A priced material, labor trade, or machine from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub code: String,
    pub name: String,
    /// Unit of measure the price refers to (m3, kg, hr, ...).
    pub unit: String,
    pub category: ResourceCategory,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Material,
    Labor,
    Machine,
}

impl ResourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Material => "material",
            Self::Labor => "labor",
            Self::Machine => "machine",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "material" => Some(Self::Material),
            "labor" => Some(Self::Labor),
            "machine" => Some(Self::Machine),
            _ => None,
        }
    }
}

/// One entry of a task's resource bill ("norm analysis" line).
///
/// The coefficient is the quantity of the resource consumed per unit of
/// the task's quantity; it is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLine {
    pub resource: Resource,
    pub coefficient: f64,
}

/// A resource requirement computed for a concrete task quantity, or the
/// run-level aggregate for one distinct resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub resource: Resource,
    pub quantity: f64,
    pub cost: f64,
}
