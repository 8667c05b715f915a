//! The estimation pipeline.
//!
//! A run is pure computation between two storage calls: bind variables,
//! select templates, load them, evaluate each task's formula, expand
//! resource bills, assemble the tree, and hand it to the estimate store
//! which replaces the project's previous tree in one shot.
//!
//! Storage is reached only through [`TemplateStore`] and
//! [`EstimateStore`], so the pipeline runs unchanged against the SQLite
//! store or an in-memory test double.

pub mod builder;
pub mod decompose;
pub mod formula;
pub mod selector;
pub mod variables;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    EstimationTree, ParameterSet, ResourceUsage, RunReport, SkippedTask, Template,
};

use builder::TreeBuilder;
use decompose::round2;
use formula::FormulaError;

/// Fatal run failures. Nothing is written when any of these occur; a
/// prior estimate stays intact.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),
    #[error("no applicable template for {group}: {param} = {value}")]
    NoApplicableTemplate {
        group: &'static str,
        param: &'static str,
        value: f64,
    },
    #[error("no applicable template for {group}: {param} is not set")]
    MissingChoice {
        group: &'static str,
        param: &'static str,
    },
    #[error("unknown template code '{0}'")]
    UnknownTemplate(String),
    #[error("template '{0}' has no tasks")]
    EmptyTemplate(String),
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

/// Read access to the template catalog.
pub trait TemplateStore {
    /// Load templates by code, with task definitions and resolved
    /// resource bills. Codes with no matching template are simply not
    /// present in the result.
    fn load_templates(&self, codes: &[String]) -> anyhow::Result<Vec<Template>>;
}

/// Write/read access to a project's stored estimate.
pub trait EstimateStore {
    /// Atomically replace the project's estimate tree: either the new
    /// tree is fully visible afterwards, or the old one is untouched.
    fn replace_tree(&self, project_id: Uuid, tree: &EstimationTree) -> anyhow::Result<()>;

    fn read_tree(&self, project_id: Uuid) -> anyhow::Result<EstimationTree>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Attach per-resource detail nodes under each task.
    pub include_resources: bool,
}

/// Compute and store the estimate for a project.
///
/// Per-task formula failures do not abort the run; the task is recorded
/// in the report's skip list and the remaining tasks still commit.
pub fn run_estimation<S>(
    store: &S,
    project_id: Uuid,
    params: &ParameterSet,
    options: &RunOptions,
) -> Result<RunReport, EngineError>
where
    S: TemplateStore + EstimateStore + ?Sized,
{
    let vars = variables::bind(params)?;
    let codes = selector::select_templates(params)?;
    tracing::debug!(project = %project_id, templates = ?codes, "templates selected");

    let templates = store.load_templates(&codes).map_err(EngineError::Storage)?;

    let mut builder = TreeBuilder::new();
    let mut skipped: Vec<SkippedTask> = Vec::new();
    let mut usages: Vec<ResourceUsage> = Vec::new();
    let mut tasks_created = 0usize;

    for code in &codes {
        let template = templates
            .iter()
            .find(|t| &t.code == code)
            .ok_or_else(|| EngineError::UnknownTemplate(code.clone()))?;
        if template.tasks.is_empty() {
            return Err(EngineError::EmptyTemplate(code.clone()));
        }

        let section = builder.section(&template.section);

        for task in &template.tasks {
            let quantity = match formula::evaluate(&task.formula, &vars) {
                Ok(quantity) => quantity,
                Err(e) => {
                    tracing::warn!(task = %task.name, error = %e, "task skipped");
                    skipped.push(SkippedTask {
                        task: task.name.clone(),
                        reason: skip_reason(&task.formula, &e),
                    });
                    continue;
                }
            };

            if quantity <= 0.0 {
                tracing::debug!(task = %task.name, quantity, "task pruned");
                continue;
            }

            let task_usages = decompose::decompose(quantity, &task.lines);
            let cost = round2(task_usages.iter().map(|u| u.cost).sum());

            let task_id = builder.add_task(
                section,
                &task.name,
                &task.unit,
                quantity,
                cost,
                &task.formula,
            );
            if let Some(task_id) = task_id {
                if options.include_resources {
                    for usage in &task_usages {
                        builder.add_resource(task_id, usage);
                    }
                }
                usages.extend(task_usages);
                tasks_created += 1;
            }
        }
    }

    let tree = builder.finish();
    let total_cost = tree.total_cost();
    store
        .replace_tree(project_id, &tree)
        .map_err(EngineError::Storage)?;

    tracing::info!(
        project = %project_id,
        tasks = tasks_created,
        skipped = skipped.len(),
        total_cost,
        "estimate stored"
    );

    Ok(RunReport {
        tasks_created,
        skipped,
        resource_totals: decompose::aggregate(&usages),
        total_cost,
    })
}

fn skip_reason(formula: &str, error: &FormulaError) -> String {
    match error {
        FormulaError::UnknownVariable(_) => error.to_string(),
        _ => format!("invalid formula '{formula}': {error}"),
    }
}
