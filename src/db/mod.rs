mod memory;
mod schema;

pub use memory::MemoryStore;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::engine::store::{ItemFilter, ItemStore, ItemTx, StoreError};
use crate::engine::EngineError;
use crate::models::*;
use crate::tools::AuditSink;

/// SQLite-backed storage. Cheap to clone; clones share one connection.
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
        tracing::debug!("Opened database at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Project operations
    // ============================================================

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, created_at FROM projects ORDER BY name, id",
        )?;

        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let conn = self.lock()?;
        let project = conn
            .query_row(
                "SELECT id, name, description, created_at FROM projects WHERE id = ?",
                [id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        let conn = self.lock()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO projects (name, description, created_at) VALUES (?, ?, ?)",
            (&input.name, &input.description, now.to_rfc3339()),
        )?;

        Ok(Project {
            id: conn.last_insert_rowid(),
            name: input.name,
            description: input.description,
            created_at: now,
        })
    }

    /// Partial update; `None` fields keep their stored value.
    pub fn update_project(&self, id: i64, input: UpdateProjectInput) -> Result<Option<Project>> {
        let Some(existing) = self.get_project(id)? else {
            return Ok(None);
        };

        let conn = self.lock()?;
        let name = input.name.unwrap_or(existing.name);
        let description = input.description.or(existing.description);

        conn.execute(
            "UPDATE projects SET name = ?, description = ? WHERE id = ?",
            (&name, &description, id),
        )?;

        Ok(Some(Project {
            id,
            name,
            description,
            created_at: existing.created_at,
        }))
    }

    /// Deletes the project and, through the foreign key, all of its items.
    pub fn delete_project(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM projects WHERE id = ?", [id])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Run step (audit) operations
    // ============================================================

    pub fn record_run_step(
        &self,
        run_id: i64,
        action: &str,
        payload: &serde_json::Value,
    ) -> Result<RunStep> {
        let conn = self.lock()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO run_steps (run_id, action, payload, created_at) VALUES (?, ?, ?, ?)",
            (run_id, action, serde_json::to_string(payload)?, now.to_rfc3339()),
        )?;

        Ok(RunStep {
            id: conn.last_insert_rowid(),
            run_id,
            action: action.to_string(),
            payload: payload.clone(),
            created_at: now,
        })
    }

    pub fn get_run_steps(&self, run_id: i64) -> Result<Vec<RunStep>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, run_id, action, payload, created_at
             FROM run_steps WHERE run_id = ? ORDER BY id",
        )?;

        let steps = stmt
            .query_map([run_id], |row| {
                let payload: String = row.get(3)?;
                Ok(RunStep {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    action: row.get(2)?,
                    payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(steps)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl ItemStore for Database {
    fn transaction<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&dyn ItemTx) -> Result<T, EngineError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn.transaction().map_err(StoreError::from)?;
        // Dropping `tx` without commit rolls back.
        let out = f(&SqliteTx { conn: &tx })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }
}

impl AuditSink for Database {
    fn record(&self, run_id: i64, action: &str, payload: &serde_json::Value) {
        if let Err(e) = self.record_run_step(run_id, action, payload) {
            tracing::warn!(run_id, action, "Failed to record run step: {}", e);
        }
    }
}

// ============================================================
// Item operations (inside a transaction)
// ============================================================

const ITEM_COLUMNS: &str = "id, project_id, type, title, description, status, parent_id";

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl ItemTx for SqliteTx<'_> {
    fn get(&self, id: i64) -> Result<Option<Item>, StoreError> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"),
                [id],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn find_by_key(
        &self,
        project_id: i64,
        item_type: ItemType,
        title: &str,
    ) -> Result<Option<Item>, StoreError> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM items
                     WHERE project_id = ? AND type = ? AND title = ? ORDER BY id LIMIT 1"
                ),
                (project_id, item_type.as_str(), title),
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn scan(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(project_id) = filter.project_id {
            clauses.push("project_id = ?");
            params.push(Box::new(project_id));
        }
        if let Some(parent_id) = filter.parent_id {
            clauses.push("parent_id = ?");
            params.push(Box::new(parent_id));
        }
        if let Some(item_type) = filter.item_type {
            clauses.push("type = ?");
            params.push(Box::new(item_type.as_str()));
        }
        if let Some(ref query) = filter.title_contains {
            // instr() is case-sensitive, unlike LIKE
            clauses.push("instr(title, ?) > 0");
            params.push(Box::new(query.clone()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        // LIMIT -1 means no limit in SQLite
        let limit = filter
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        params.push(Box::new(limit));
        params.push(Box::new(i64::try_from(filter.offset).unwrap_or(i64::MAX)));

        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM items{where_sql} ORDER BY id LIMIT ? OFFSET ?");
        let params_ref: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_ref.as_slice(), item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn insert(&self, item: NewItem) -> Result<Item, StoreError> {
        self.conn.execute(
            "INSERT INTO items (project_id, type, title, description, status, parent_id)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                item.project_id,
                item.item_type.as_str(),
                &item.title,
                &item.description,
                &item.status,
                item.parent_id,
            ),
        )?;

        Ok(item.into_item(self.conn.last_insert_rowid()))
    }

    fn set_parent(&self, id: i64, parent_id: Option<i64>) -> Result<bool, StoreError> {
        let rows = self.conn.execute(
            "UPDATE items SET parent_id = ? WHERE id = ?",
            (parent_id, id),
        )?;
        Ok(rows > 0)
    }

    fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let rows = self.conn.execute("DELETE FROM items WHERE id = ?", [id])?;
        Ok(rows > 0)
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let type_name: String = row.get(2)?;
    let item_type = type_name.parse::<ItemType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Item {
        id: row.get(0)?,
        project_id: row.get(1)?,
        item_type,
        title: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        parent_id: row.get(6)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_datetime(row.get::<_, String>(3)?),
    })
}

fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "agent4ba")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("agent4ba.db"))
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn poisoned_db() -> Database {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        let conn = db.conn.clone();
        let _ = std::thread::spawn(move || {
            let _guard = conn.lock().unwrap();
            panic!("writer crashed while holding the connection");
        })
        .join();
        db
    }

    #[test]
    fn poisoned_lock_is_an_error_not_a_panic() {
        let db = poisoned_db();
        assert!(db.record_run_step(1, "tool:get_item", &json!({ "id": 1 })).is_err());
        assert!(db.list_projects().is_err());
    }

    #[test]
    fn audit_sink_swallows_poisoned_lock() {
        let db = poisoned_db();
        db.record(1, "tool:get_item", &json!({ "id": 1 }));
    }

    #[test]
    fn update_project_keeps_unset_fields() {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        let project = db
            .create_project(CreateProjectInput {
                name: "Old".to_string(),
                description: Some("kept".to_string()),
            })
            .unwrap();

        let updated = db
            .update_project(
                project.id,
                UpdateProjectInput {
                    name: Some("New".to_string()),
                    description: None,
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.description.as_deref(), Some("kept"));
        assert_eq!(db.get_project(project.id).unwrap().unwrap().name, "New");
        assert!(db.update_project(999, UpdateProjectInput::default()).unwrap().is_none());
    }
}
