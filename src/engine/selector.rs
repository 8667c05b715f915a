//! Template selection rules.
//!
//! Which templates apply to a run is decided by an explicit rule table,
//! grouped by construction choice. Each group either always contributes
//! (structure, finishes) or is keyed by an enumerated choice parameter
//! carried as a numeric code in the parameter set. New rules are added
//! here without touching the evaluator or the tree builder.

use crate::models::ParameterSet;

use super::EngineError;

pub const SOIL_GOOD: f64 = 1.0;
pub const SOIL_WEAK: f64 = 2.0;
pub const WALL_BRICK: f64 = 1.0;
pub const WALL_BLOCK: f64 = 2.0;
pub const ROOF_FLAT: f64 = 1.0;
pub const ROOF_PITCHED: f64 = 2.0;

/// Applicability condition of one rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Always,
    Equals { param: &'static str, code: f64 },
}

pub struct Rule {
    pub condition: Condition,
    pub templates: &'static [&'static str],
}

/// A set of alternative rules for one construction choice.
///
/// `choice` names the parameter driving the group, if any. Required
/// groups fail the run when their choice is missing or unmatched;
/// optional groups are skipped when the choice parameter is absent, but
/// a present, unknown code is still an error.
pub struct RuleGroup {
    pub name: &'static str,
    pub choice: Option<&'static str>,
    pub required: bool,
    pub rules: &'static [Rule],
}

pub const RULES: &[RuleGroup] = &[
    RuleGroup {
        name: "foundation",
        choice: Some("soil_type"),
        required: true,
        rules: &[
            Rule {
                condition: Condition::Equals {
                    param: "soil_type",
                    code: SOIL_GOOD,
                },
                templates: &["strip-foundation"],
            },
            Rule {
                condition: Condition::Equals {
                    param: "soil_type",
                    code: SOIL_WEAK,
                },
                templates: &["pile-foundation"],
            },
        ],
    },
    RuleGroup {
        name: "structure",
        choice: None,
        required: true,
        rules: &[Rule {
            condition: Condition::Always,
            templates: &["superstructure"],
        }],
    },
    RuleGroup {
        name: "walls",
        choice: Some("wall_type"),
        required: false,
        rules: &[
            Rule {
                condition: Condition::Equals {
                    param: "wall_type",
                    code: WALL_BRICK,
                },
                templates: &["brick-walls"],
            },
            Rule {
                condition: Condition::Equals {
                    param: "wall_type",
                    code: WALL_BLOCK,
                },
                templates: &["block-walls"],
            },
        ],
    },
    RuleGroup {
        name: "roof",
        choice: Some("roof_type"),
        required: false,
        rules: &[
            Rule {
                condition: Condition::Equals {
                    param: "roof_type",
                    code: ROOF_FLAT,
                },
                templates: &["flat-roof"],
            },
            Rule {
                condition: Condition::Equals {
                    param: "roof_type",
                    code: ROOF_PITCHED,
                },
                templates: &["pitched-roof"],
            },
        ],
    },
    RuleGroup {
        name: "finishes",
        choice: None,
        required: true,
        rules: &[Rule {
            condition: Condition::Always,
            templates: &["finishing"],
        }],
    },
];

/// Resolve the template codes to apply for this run, in rule-table order.
pub fn select_templates(params: &ParameterSet) -> Result<Vec<String>, EngineError> {
    let mut selected: Vec<String> = Vec::new();

    for group in RULES {
        let matched = group
            .rules
            .iter()
            .find(|rule| condition_holds(&rule.condition, params));

        match matched {
            Some(rule) => {
                for code in rule.templates {
                    if !selected.iter().any(|c| c == code) {
                        selected.push(code.to_string());
                    }
                }
            }
            None => {
                let param = group.choice.unwrap_or(group.name);
                match params.get(param) {
                    Some(value) => {
                        return Err(EngineError::NoApplicableTemplate {
                            group: group.name,
                            param,
                            value,
                        });
                    }
                    None if group.required => {
                        return Err(EngineError::MissingChoice {
                            group: group.name,
                            param,
                        });
                    }
                    None => {}
                }
            }
        }
    }

    Ok(selected)
}

/// Translate a symbolic choice value (`soil_type=weak`) to its code.
pub fn choice_code(param: &str, label: &str) -> Option<f64> {
    match (param, label) {
        ("soil_type", "good") => Some(SOIL_GOOD),
        ("soil_type", "weak") => Some(SOIL_WEAK),
        ("wall_type", "brick") => Some(WALL_BRICK),
        ("wall_type", "block") => Some(WALL_BLOCK),
        ("roof_type", "flat") => Some(ROOF_FLAT),
        ("roof_type", "pitched") => Some(ROOF_PITCHED),
        _ => None,
    }
}

fn condition_holds(condition: &Condition, params: &ParameterSet) -> bool {
    match condition {
        Condition::Always => true,
        Condition::Equals { param, code } => params.get(param) == Some(*code),
    }
}
