//! Namespace registry: maps groups and workspaces to their materialized path.
//!
//! Every function here takes a plain `&Connection` so it can run inside a
//! caller's transaction (`Transaction` derefs to `Connection`).

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::path;
use crate::error::{Error, Result};
use crate::types::{Namespace, NamespaceOwner};

const NAMESPACE_COLUMNS: &str = "id, version, path, group_id, workspace_id";

/// SQL predicate matching `column` equal to `?N` or lying under `?N/`.
/// Written without LIKE so names containing `_` match literally.
pub(crate) fn subtree_predicate(column: &str, param: usize) -> String {
    format!("({column} = ?{param} OR substr({column}, 1, length(?{param}) + 1) = ?{param} || '/')")
}

/// SQL predicate: `ancestor` column is the same path as, or an ancestor of,
/// `path` column.
pub(crate) fn ancestor_or_equal_predicate(ancestor: &str, path: &str) -> String {
    format!(
        "({path} = {ancestor} OR substr({path}, 1, length({ancestor}) + 1) = {ancestor} || '/')"
    )
}

fn namespace_from_row(row: &Row<'_>) -> rusqlite::Result<Namespace> {
    let group_id: Option<String> = row.get(3)?;
    let workspace_id: Option<String> = row.get(4)?;
    let owner = match (group_id, workspace_id) {
        (Some(id), None) => NamespaceOwner::Group(id),
        (None, Some(id)) => NamespaceOwner::Workspace(id),
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                3,
                "group_id".to_string(),
                rusqlite::types::Type::Null,
            ));
        }
    };
    Ok(Namespace {
        id: row.get(0)?,
        version: row.get(1)?,
        path: row.get(2)?,
        owner,
    })
}

fn query_one(conn: &Connection, filter: &str, value: &str) -> Result<Option<Namespace>> {
    conn.query_row(
        &format!("SELECT {NAMESPACE_COLUMNS} FROM namespaces WHERE {filter} = ?1"),
        params![value],
        namespace_from_row,
    )
    .optional()
    .map_err(Error::from)
}

/// Exact path lookup. A malformed path is `Invalid`; an unknown one is `None`.
pub fn resolve_by_path(conn: &Connection, namespace_path: &str) -> Result<Option<Namespace>> {
    path::validate_path(namespace_path)?;
    query_one(conn, "path", namespace_path)
}

pub fn resolve_by_group_id(conn: &Connection, group_id: &str) -> Result<Option<Namespace>> {
    query_one(conn, "group_id", group_id)
}

pub fn resolve_by_workspace_id(conn: &Connection, workspace_id: &str) -> Result<Option<Namespace>> {
    query_one(conn, "workspace_id", workspace_id)
}

/// Inserts the namespace row for a new group or workspace.
pub(crate) fn insert(conn: &Connection, ns: &Namespace) -> Result<()> {
    let (group_id, workspace_id) = match &ns.owner {
        NamespaceOwner::Group(id) => (Some(id.as_str()), None),
        NamespaceOwner::Workspace(id) => (None, Some(id.as_str())),
    };
    conn.execute(
        "INSERT INTO namespaces (id, version, path, group_id, workspace_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![ns.id, ns.version, ns.path, group_id, workspace_id],
    )?;
    Ok(())
}

/// Rewrites `old_prefix` to `new_prefix` on every namespace equal to or under
/// `old_prefix`, in one statement. Returns the number of rows rewritten.
pub fn rewrite_prefix(conn: &Connection, old_prefix: &str, new_prefix: &str) -> Result<usize> {
    path::validate_path(old_prefix)?;
    path::validate_path(new_prefix)?;

    let rows = conn.execute(
        &format!(
            "UPDATE namespaces
             SET path = ?2 || substr(path, length(?1) + 1), version = version + 1
             WHERE {}",
            subtree_predicate("path", 1)
        ),
        params![old_prefix, new_prefix],
    )?;

    tracing::debug!(old_prefix, new_prefix, rows, "Rewrote namespace paths");
    Ok(rows)
}

/// Walks to the topmost namespace of `namespace_path` and returns the group
/// that owns it.
pub fn root_group_id(conn: &Connection, namespace_path: &str) -> Result<String> {
    let root = path::root_segment(namespace_path);
    let ns = resolve_by_path(conn, root)?.ok_or_else(|| {
        Error::Internal(format!("root namespace '{root}' of '{namespace_path}' is missing"))
    })?;
    match ns.owner {
        NamespaceOwner::Group(id) => Ok(id),
        NamespaceOwner::Workspace(_) => Err(Error::Internal(format!(
            "root namespace '{root}' is owned by a workspace"
        ))),
    }
}

/// Current full path of a group, or `None` if the group has no namespace.
pub(crate) fn group_path(conn: &Connection, group_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT path FROM namespaces WHERE group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::from)
}
