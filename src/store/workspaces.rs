use rusqlite::{Connection, OptionalExtension, Row, params};

use super::sqlite::parse_datetime;
use crate::error::{Error, Result};
use crate::types::{ResourceMetadata, Trn, Workspace};

const WORKSPACE_SELECT: &str = "SELECT w.id, w.version, w.created_at, w.updated_at, w.name, w.description,
            w.group_id, w.created_by, n.path
     FROM workspaces w JOIN namespaces n ON n.workspace_id = w.id";

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    let full_path: String = row.get(8)?;
    Ok(Workspace {
        metadata: ResourceMetadata {
            id: row.get(0)?,
            version: row.get(1)?,
            trn: Trn::workspace(&full_path).to_string(),
            created_at: parse_datetime(&row.get::<_, String>(2)?),
            updated_at: parse_datetime(&row.get::<_, String>(3)?),
        },
        name: row.get(4)?,
        description: row.get(5)?,
        group_id: row.get(6)?,
        created_by: row.get(7)?,
        full_path,
    })
}

fn get_one(conn: &Connection, filter: &str, value: &str) -> Result<Option<Workspace>> {
    conn.query_row(
        &format!("{WORKSPACE_SELECT} WHERE {filter} = ?1"),
        params![value],
        workspace_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub(crate) fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Workspace>> {
    get_one(conn, "w.id", id)
}

pub(crate) fn get_by_path(conn: &Connection, full_path: &str) -> Result<Option<Workspace>> {
    get_one(conn, "n.path", full_path)
}
