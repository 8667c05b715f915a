use std::sync::Mutex;

use speculate2::speculate;
use takeoff::db::Database;
use takeoff::engine::selector::{ROOF_PITCHED, SOIL_GOOD, SOIL_WEAK, WALL_BRICK};
use takeoff::engine::{run_estimation, EngineError, EstimateStore, RunOptions, TemplateStore};
use takeoff::models::*;
use uuid::Uuid;

fn create_test_project(db: &Database) -> Project {
    db.create_project(CreateProjectInput {
        name: "Riverside House".to_string(),
        site_address: None,
    })
    .expect("Failed to create project")
}

/// Full parameter set on good soil: every catalog formula resolves.
fn full_params() -> ParameterSet {
    ParameterSet::new()
        .with("width", 10.0)
        .with("length", 8.0)
        .with("num_floors", 2.0)
        .with("floor_height", 3.0)
        .with("soil_type", SOIL_GOOD)
        .with("wall_type", WALL_BRICK)
        .with("roof_type", ROOF_PITCHED)
}

/// Weak-soil scenario without floor_height: pile foundation applies and
/// height-dependent tasks cannot evaluate.
fn weak_soil_params() -> ParameterSet {
    ParameterSet::new()
        .with("width", 5.0)
        .with("length", 20.0)
        .with("num_floors", 3.0)
        .with("soil_type", SOIL_WEAK)
        .with("pile_length", 20.0)
}

/// In-memory store double: the engine only sees the storage traits, so a
/// crafted catalog is enough to drive it.
struct MemStore {
    templates: Vec<Template>,
    tree: Mutex<Option<EstimationTree>>,
}

impl MemStore {
    fn new(templates: Vec<Template>) -> Self {
        Self {
            templates,
            tree: Mutex::new(None),
        }
    }

    fn stored(&self) -> Option<EstimationTree> {
        self.tree.lock().unwrap().clone()
    }
}

impl TemplateStore for MemStore {
    fn load_templates(&self, codes: &[String]) -> anyhow::Result<Vec<Template>> {
        Ok(self
            .templates
            .iter()
            .filter(|t| codes.contains(&t.code))
            .cloned()
            .collect())
    }
}

impl EstimateStore for MemStore {
    fn replace_tree(&self, _project_id: Uuid, tree: &EstimationTree) -> anyhow::Result<()> {
        *self.tree.lock().unwrap() = Some(tree.clone());
        Ok(())
    }

    fn read_tree(&self, _project_id: Uuid) -> anyhow::Result<EstimationTree> {
        Ok(self.stored().unwrap_or_default())
    }
}

fn mem_template(code: &str, section: &str, tasks: &[(&str, &str)]) -> Template {
    Template {
        code: code.to_string(),
        name: code.to_string(),
        section: section.to_string(),
        tasks: tasks
            .iter()
            .enumerate()
            .map(|(i, (name, formula))| TaskDefinition {
                name: name.to_string(),
                unit: "m3".to_string(),
                norm_code: format!("N-{i}"),
                formula: formula.to_string(),
                position: i as i64,
                lines: Vec::new(),
            })
            .collect(),
    }
}

/// Minimal good-soil catalog for the store double: the selector picks
/// strip-foundation, superstructure, and finishing.
fn mem_catalog() -> Vec<Template> {
    vec![
        mem_template("strip-foundation", "Substructure", &[("Trench", "perimeter * 0.5")]),
        mem_template("superstructure", "Superstructure", &[("Slab", "floor_area * 0.15")]),
        mem_template("finishing", "Finishes", &[("Screed", "total_floor_area * 0.04")]),
    ]
}

fn minimal_params() -> ParameterSet {
    ParameterSet::new()
        .with("width", 10.0)
        .with("length", 8.0)
        .with("num_floors", 2.0)
        .with("soil_type", SOIL_GOOD)
}

fn task_labels(tree: &EstimationTree, section_label: &str) -> Vec<String> {
    let section = tree
        .sections()
        .into_iter()
        .find(|s| s.label == section_label)
        .expect("section not found");
    tree.children(section.id)
        .iter()
        .map(|n| n.label.clone())
        .collect()
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let project = create_test_project(&db);
        let options = RunOptions::default();
    }

    describe "run_estimation" {
        describe "complete runs" {
            it "evaluates every task when all parameters are present" {
                let report = run_estimation(&db, project.id, &full_params(), &options)
                    .expect("run failed");

                assert_eq!(report.status(), RunStatus::Complete);
                assert!(report.skipped.is_empty());
                assert_eq!(report.tasks_created, 13);
            }

            it "groups tasks into sections and merges shared section labels" {
                run_estimation(&db, project.id, &full_params(), &options).expect("run failed");
                let tree = db.read_estimation_tree(project.id).expect("read failed");

                let labels: Vec<String> =
                    tree.sections().iter().map(|s| s.label.clone()).collect();
                assert_eq!(
                    labels,
                    vec!["Substructure", "Superstructure", "Roof", "Finishes"]
                );

                // superstructure and brick-walls both target "Superstructure"
                let tasks = task_labels(&tree, "Superstructure");
                assert!(tasks.contains(&"Floor slab concrete".to_string()));
                assert!(tasks.contains(&"Brick masonry".to_string()));
            }

            it "computes quantities from the bound parameters" {
                run_estimation(&db, project.id, &full_params(), &options).expect("run failed");
                let tree = db.read_estimation_tree(project.id).expect("read failed");

                // perimeter 36: trench = 36 * 0.6 * 0.9
                let trench = tree
                    .tasks()
                    .find(|t| t.label == "Trench excavation")
                    .expect("trench task missing");
                assert_eq!(trench.quantity, Some(19.44));

                // brick masonry = perimeter * total_height = 36 * 6
                let masonry = tree
                    .tasks()
                    .find(|t| t.label == "Brick masonry")
                    .expect("masonry task missing");
                assert_eq!(masonry.quantity, Some(216.0));
            }
        }

        describe "pruning" {
            it "never stores a task with a non-positive quantity" {
                // width 0 zeroes out every area-driven formula
                let params = full_params().with("width", 0.0);
                let report = run_estimation(&db, project.id, &params, &options)
                    .expect("run failed");
                let tree = db.read_estimation_tree(project.id).expect("read failed");

                for task in tree.tasks() {
                    assert!(task.quantity.unwrap() > 0.0);
                }
                // pruned tasks are not errors and must not appear as skips
                assert!(report.skipped.is_empty());
            }
        }

        describe "partial runs" {
            it "records skipped tasks and still commits the rest" {
                let report = run_estimation(&db, project.id, &weak_soil_params(), &options)
                    .expect("run failed");

                assert_eq!(report.status(), RunStatus::Partial);
                assert_eq!(report.tasks_created, 6);

                let skipped: Vec<&str> =
                    report.skipped.iter().map(|s| s.task.as_str()).collect();
                assert_eq!(
                    skipped,
                    vec!["Column concrete", "Wall plastering", "Painting"]
                );
                for skip in &report.skipped {
                    assert_eq!(skip.reason, "unresolved variable: total_height");
                }
            }
        }

        describe "weak soil scenario" {
            it "selects pile foundation and carries pile_length provenance" {
                run_estimation(&db, project.id, &weak_soil_params(), &options)
                    .expect("run failed");
                let tree = db.read_estimation_tree(project.id).expect("read failed");

                let section = tree
                    .sections()
                    .into_iter()
                    .find(|s| s.label == "Substructure")
                    .expect("substructure section missing");
                let piles = tree.children(section.id);
                assert_eq!(piles.len(), 3);
                for task in piles {
                    assert!(
                        task.formula.as_ref().unwrap().contains("pile_length"),
                        "task '{}' lacks pile_length provenance",
                        task.label
                    );
                }
            }

            it "floor slab quantity follows floor area times floor count" {
                run_estimation(&db, project.id, &weak_soil_params(), &options)
                    .expect("run failed");
                let tree = db.read_estimation_tree(project.id).expect("read failed");

                // 5 * 20 * 3 floors * 0.15 slab thickness
                let slab = tree
                    .tasks()
                    .find(|t| t.label == "Floor slab concrete")
                    .expect("slab task missing");
                assert_eq!(slab.quantity, Some(45.0));
            }

            it "good soil never selects the pile foundation" {
                run_estimation(&db, project.id, &full_params(), &options).expect("run failed");
                let tree = db.read_estimation_tree(project.id).expect("read failed");

                assert!(tree.tasks().all(|t| !t.label.starts_with("Pile")));
                assert!(tree.tasks().any(|t| t.label == "Trench excavation"));
            }
        }

        describe "determinism and replacement" {
            it "produces identical trees for identical parameters" {
                run_estimation(&db, project.id, &full_params(), &options).expect("run failed");
                let first = db.read_estimation_tree(project.id).expect("read failed");
                let report = run_estimation(&db, project.id, &full_params(), &options)
                    .expect("run failed");
                let second = db.read_estimation_tree(project.id).expect("read failed");

                assert_eq!(first, second);
                assert_eq!(report.total_cost, first.total_cost());
            }

            it "wholly replaces the previous estimate" {
                run_estimation(&db, project.id, &weak_soil_params(), &options)
                    .expect("run failed");
                run_estimation(&db, project.id, &full_params(), &options).expect("run failed");
                let tree = db.read_estimation_tree(project.id).expect("read failed");

                assert!(tree.tasks().all(|t| t.label != "Pile boring"));
                assert!(tree.tasks().any(|t| t.label == "Trench excavation"));
            }
        }

        describe "resource detail" {
            it "attaches resource nodes only when requested" {
                run_estimation(&db, project.id, &full_params(), &options).expect("run failed");
                let bare = db.read_estimation_tree(project.id).expect("read failed");
                assert_eq!(
                    bare.nodes.iter().filter(|n| n.kind == NodeKind::Resource).count(),
                    0
                );

                let detailed_options = RunOptions { include_resources: true };
                run_estimation(&db, project.id, &full_params(), &detailed_options)
                    .expect("run failed");
                let detailed = db.read_estimation_tree(project.id).expect("read failed");
                let resource_nodes: Vec<_> = detailed
                    .nodes
                    .iter()
                    .filter(|n| n.kind == NodeKind::Resource)
                    .collect();
                assert!(!resource_nodes.is_empty());
                for node in resource_nodes {
                    let parent = detailed.get(node.parent_id.unwrap()).unwrap();
                    assert_eq!(parent.kind, NodeKind::Task);
                }
            }

            it "rolls resource totals up across tasks" {
                let report = run_estimation(&db, project.id, &weak_soil_params(), &options)
                    .expect("run failed");

                // pile concrete 47.333 * 1.05 + floor slab 45 * 1.02
                let concrete = report
                    .resource_totals
                    .iter()
                    .find(|t| t.resource.code == "CONC-C25")
                    .expect("concrete total missing");
                assert_eq!(concrete.quantity, 95.6);

                let totals_cost: f64 = report.resource_totals.iter().map(|t| t.cost).sum();
                assert!((totals_cost - report.total_cost).abs() < 0.01);
            }
        }

        describe "fatal errors" {
            it "fails when required parameters are missing and writes nothing" {
                let params = ParameterSet::new().with("width", 10.0);
                let err = run_estimation(&db, project.id, &params, &options).unwrap_err();

                match err {
                    EngineError::MissingParameters(names) => {
                        assert_eq!(names, vec!["length".to_string(), "num_floors".to_string()]);
                    }
                    other => panic!("unexpected error: {other:?}"),
                }
                let tree = db.read_estimation_tree(project.id).expect("read failed");
                assert!(tree.is_empty());
            }

            it "fails on an unknown choice code and leaves the prior estimate intact" {
                run_estimation(&db, project.id, &full_params(), &options).expect("run failed");
                let before = db.read_estimation_tree(project.id).expect("read failed");

                let params = full_params().with("soil_type", 9.0);
                let err = run_estimation(&db, project.id, &params, &options).unwrap_err();
                assert!(matches!(
                    err,
                    EngineError::NoApplicableTemplate { group: "foundation", .. }
                ));

                let after = db.read_estimation_tree(project.id).expect("read failed");
                assert_eq!(before, after);
            }

            it "fails when the foundation choice is absent" {
                let params = ParameterSet::new()
                    .with("width", 10.0)
                    .with("length", 8.0)
                    .with("num_floors", 2.0);
                let err = run_estimation(&db, project.id, &params, &options).unwrap_err();
                assert!(matches!(
                    err,
                    EngineError::MissingChoice { group: "foundation", .. }
                ));
            }
        }
    }

    describe "storage trait seam" {
        it "runs against an in-memory store" {
            let store = MemStore::new(mem_catalog());
            let report = run_estimation(&store, project.id, &minimal_params(), &options)
                .expect("run failed");

            assert_eq!(report.tasks_created, 3);
            let tree = store.stored().expect("tree not stored");
            assert_eq!(tree.sections().len(), 3);
        }

        it "reports a malformed formula as an invalid-formula skip" {
            let mut catalog = mem_catalog();
            catalog[0] = mem_template(
                "strip-foundation",
                "Substructure",
                &[("Trench", "perimeter * (0.5")],
            );
            let store = MemStore::new(catalog);

            let report = run_estimation(&store, project.id, &minimal_params(), &options)
                .expect("run failed");
            let skip = &report.skipped[0];
            assert_eq!(skip.task, "Trench");
            assert!(skip.reason.contains("invalid formula 'perimeter * (0.5'"));
        }

        it "reports division by zero as an invalid formula rather than infinity" {
            let mut catalog = mem_catalog();
            catalog[0] = mem_template(
                "strip-foundation",
                "Substructure",
                &[("Trench", "perimeter / (num_floors - 2)")],
            );
            let store = MemStore::new(catalog);

            // num_floors = 2 makes the divisor zero
            let report = run_estimation(&store, project.id, &minimal_params(), &options)
                .expect("run failed");
            let skip = &report.skipped[0];
            assert_eq!(skip.task, "Trench");
            assert!(skip.reason.contains("division by zero"));
        }

        it "fails fatally when a selected template is missing from the catalog" {
            let mut catalog = mem_catalog();
            catalog.retain(|t| t.code != "finishing");
            let store = MemStore::new(catalog);

            let err = run_estimation(&store, project.id, &minimal_params(), &options)
                .unwrap_err();
            assert!(matches!(err, EngineError::UnknownTemplate(code) if code == "finishing"));
            assert!(store.stored().is_none());
        }

        it "fails fatally when a selected template has no tasks" {
            let mut catalog = mem_catalog();
            catalog[2] = mem_template("finishing", "Finishes", &[]);
            let store = MemStore::new(catalog);

            let err = run_estimation(&store, project.id, &minimal_params(), &options)
                .unwrap_err();
            assert!(matches!(err, EngineError::EmptyTemplate(code) if code == "finishing"));
            assert!(store.stored().is_none());
        }
    }
}
