mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::engine::{EstimateStore, TemplateStore};
use crate::models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "takeoff")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("takeoff.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Project operations
    // ============================================================

    pub fn get_all_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, site_address, created_at, updated_at
             FROM projects ORDER BY name",
        )?;

        let projects = stmt
            .query_map([], |row| {
                Ok(Project {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    site_address: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                    updated_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, site_address, created_at, updated_at
             FROM projects WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Project {
                id: parse_uuid(row.get::<_, String>(0)?),
                name: row.get(1)?,
                site_address: row.get(2)?,
                created_at: parse_datetime(row.get::<_, String>(3)?),
                updated_at: parse_datetime(row.get::<_, String>(4)?),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn get_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, site_address, created_at, updated_at
             FROM projects WHERE name = ?",
        )?;

        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Project {
                id: parse_uuid(row.get::<_, String>(0)?),
                name: row.get(1)?,
                site_address: row.get(2)?,
                created_at: parse_datetime(row.get::<_, String>(3)?),
                updated_at: parse_datetime(row.get::<_, String>(4)?),
            }))
        } else {
            Ok(None)
        }
    }

    /// Resolve a project by UUID or, failing that, by exact name.
    pub fn find_project(&self, key: &str) -> Result<Option<Project>> {
        if let Ok(id) = Uuid::parse_str(key) {
            return self.get_project(id);
        }
        self.get_project_by_name(key)
    }

    pub fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO projects (id, name, site_address, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.name,
                &input.site_address,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Project {
            id,
            name: input.name,
            site_address: input.site_address,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn delete_project(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM projects WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Catalog operations
    // ============================================================

    pub fn get_templates(&self, codes: &[String]) -> Result<Vec<Template>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut templates = Vec::new();
        for code in codes {
            if let Some(template) = load_template(&conn, code)? {
                templates.push(template);
            }
        }
        Ok(templates)
    }

    pub fn get_all_templates(&self) -> Result<Vec<Template>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let codes: Vec<String> = {
            let mut stmt = conn.prepare("SELECT code FROM templates ORDER BY position")?;
            let codes = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            codes
        };

        let mut templates = Vec::new();
        for code in &codes {
            if let Some(template) = load_template(&conn, code)? {
                templates.push(template);
            }
        }
        Ok(templates)
    }

    // ============================================================
    // Estimate operations
    // ============================================================

    /// Replace the project's stored estimate with `tree`.
    ///
    /// Delete and insert run inside one transaction: on any failure the
    /// previous tree remains untouched.
    pub fn replace_estimation_tree(&self, project_id: Uuid, tree: &EstimationTree) -> Result<()> {
        validate_tree(tree)?;

        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM estimate_nodes WHERE project_id = ?",
            [project_id.to_string()],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO estimate_nodes
                 (project_id, node_id, parent_id, kind, label, unit, quantity, cost, formula, position)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for node in &tree.nodes {
                stmt.execute((
                    project_id.to_string(),
                    node.id,
                    node.parent_id,
                    node.kind.as_str(),
                    &node.label,
                    &node.unit,
                    node.quantity,
                    node.cost,
                    &node.formula,
                    node.position,
                ))?;
            }
        }

        tx.commit()?;
        tracing::debug!(project = %project_id, nodes = tree.len(), "estimate tree replaced");
        Ok(())
    }

    pub fn read_estimation_tree(&self, project_id: Uuid) -> Result<EstimationTree> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT node_id, parent_id, kind, label, unit, quantity, cost, formula, position
             FROM estimate_nodes WHERE project_id = ? ORDER BY node_id",
        )?;

        let nodes = stmt
            .query_map([project_id.to_string()], |row| {
                Ok(EstimateNode {
                    id: row.get(0)?,
                    parent_id: row.get(1)?,
                    kind: NodeKind::from_str(&row.get::<_, String>(2)?)
                        .unwrap_or(NodeKind::Section),
                    label: row.get(3)?,
                    unit: row.get(4)?,
                    quantity: row.get(5)?,
                    cost: row.get(6)?,
                    formula: row.get(7)?,
                    position: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EstimationTree { nodes })
    }
}

impl TemplateStore for Database {
    fn load_templates(&self, codes: &[String]) -> Result<Vec<Template>> {
        self.get_templates(codes)
    }
}

impl EstimateStore for Database {
    fn replace_tree(&self, project_id: Uuid, tree: &EstimationTree) -> Result<()> {
        self.replace_estimation_tree(project_id, tree)
    }

    fn read_tree(&self, project_id: Uuid) -> Result<EstimationTree> {
        self.read_estimation_tree(project_id)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn load_template(conn: &Connection, code: &str) -> Result<Option<Template>> {
    let mut stmt = conn.prepare("SELECT name, section FROM templates WHERE code = ?")?;
    let mut rows = stmt.query([code])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let name: String = row.get(0)?;
    let section: String = row.get(1)?;

    let mut stmt = conn.prepare(
        "SELECT name, unit, norm_code, formula, position
         FROM template_tasks WHERE template_code = ? ORDER BY position",
    )?;
    let mut tasks = stmt
        .query_map([code], |row| {
            Ok(TaskDefinition {
                name: row.get(0)?,
                unit: row.get(1)?,
                norm_code: row.get(2)?,
                formula: row.get(3)?,
                position: row.get(4)?,
                lines: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for task in &mut tasks {
        task.lines = load_norm_lines(conn, &task.norm_code)?;
    }

    Ok(Some(Template {
        code: code.to_string(),
        name,
        section,
        tasks,
    }))
}

fn load_norm_lines(conn: &Connection, norm_code: &str) -> Result<Vec<ResourceLine>> {
    let mut stmt = conn.prepare(
        "SELECT r.code, r.name, r.unit, r.category, r.unit_price, n.coefficient
         FROM norm_lines n
         JOIN resources r ON r.code = n.resource_code
         WHERE n.norm_code = ? ORDER BY n.id",
    )?;

    let lines = stmt
        .query_map([norm_code], |row| {
            Ok(ResourceLine {
                resource: Resource {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    unit: row.get(2)?,
                    category: ResourceCategory::from_str(&row.get::<_, String>(3)?)
                        .unwrap_or(ResourceCategory::Material),
                    unit_price: row.get(4)?,
                },
                coefficient: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lines)
}

/// Reject trees whose parent links do not form a section → task →
/// resource hierarchy before anything is deleted.
fn validate_tree(tree: &EstimationTree) -> Result<()> {
    for node in &tree.nodes {
        let parent = match node.parent_id {
            Some(parent_id) => match tree.get(parent_id) {
                Some(parent) => Some(parent),
                None => anyhow::bail!(
                    "estimate node '{}' references missing parent {}",
                    node.label,
                    parent_id
                ),
            },
            None => None,
        };

        let ok = match node.kind {
            NodeKind::Section => parent.is_none(),
            NodeKind::Task => matches!(parent, Some(p) if p.kind == NodeKind::Section),
            NodeKind::Resource => matches!(parent, Some(p) if p.kind == NodeKind::Task),
        };
        if !ok {
            anyhow::bail!(
                "estimate node '{}' ({}) has an invalid parent",
                node.label,
                node.kind.as_str()
            );
        }
    }
    Ok(())
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
