//! Subtree migration: moves a group (and everything under it) to a new parent
//! or to the top level.
//!
//! Runs entirely on the caller's transaction. Any error leaves the
//! transaction to be rolled back, so callers observe either the fully moved
//! subtree or the untouched one.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::sqlite::format_datetime;
use super::{cleaner, groups, namespace, path};
use crate::error::{Error, Result};
use crate::types::Group;

/// Limits enforced while migrating.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MigrationLimits {
    pub max_group_depth: Option<usize>,
}

#[derive(Debug)]
pub(crate) struct Migration {
    pub group: Group,
    pub old_path: String,
    pub rewritten: usize,
    pub pruned: usize,
    pub reattributed: usize,
}

fn stored_state(conn: &Connection, group_id: &str) -> Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT g.version, n.path FROM groups g JOIN namespaces n ON n.group_id = g.id
         WHERE g.id = ?1",
        params![group_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(Error::from)
}

/// Resolves the new parent's current path and rejects parents that would
/// make the tree cyclic.
fn resolve_new_parent_path(
    conn: &Connection,
    group_id: &str,
    old_path: &str,
    new_parent: &Group,
) -> Result<String> {
    if new_parent.metadata.id == group_id {
        return Err(Error::conflict("a group cannot be migrated under itself"));
    }

    let parent_path = namespace::group_path(conn, &new_parent.metadata.id)?.ok_or_else(|| {
        Error::conflict(format!(
            "new parent group {} does not exist",
            new_parent.metadata.id
        ))
    })?;

    if path::is_ancestor_or_equal(old_path, &parent_path) {
        return Err(Error::conflict(format!(
            "cannot migrate group '{old_path}' under its own descendant '{parent_path}'"
        )));
    }

    Ok(parent_path)
}

pub(crate) fn migrate(
    conn: &Connection,
    group: &Group,
    new_parent: Option<&Group>,
    limits: MigrationLimits,
) -> Result<Migration> {
    let group_id = group.metadata.id.as_str();

    let (stored_version, old_path) =
        stored_state(conn, group_id)?.ok_or(Error::OptimisticLock)?;
    if stored_version != group.metadata.version {
        return Err(Error::OptimisticLock);
    }

    let parent_path = new_parent
        .map(|parent| resolve_new_parent_path(conn, group_id, &old_path, parent))
        .transpose()?;

    let name = old_path.rsplit('/').next().unwrap_or(&old_path);
    let new_path = path::join(parent_path.as_deref(), name);

    if new_path != old_path && namespace::resolve_by_path(conn, &new_path)?.is_some() {
        return Err(Error::conflict(format!(
            "a group or workspace already exists at path '{new_path}'"
        )));
    }

    if let Some(max) = limits.max_group_depth {
        let deepest = path::level(&new_path) + groups::child_depth(conn, group_id)?;
        if deepest > max {
            return Err(Error::invalid(format!(
                "migrating '{old_path}' to '{new_path}' would nest groups {deepest} levels deep; the limit is {max}"
            )));
        }
    }

    let rewritten = namespace::rewrite_prefix(conn, &old_path, &new_path)?;

    let rows = conn.execute(
        "UPDATE groups SET parent_id = ?1, version = version + 1, updated_at = ?2
         WHERE id = ?3 AND version = ?4",
        params![
            new_parent.map(|p| p.metadata.id.as_str()),
            format_datetime(&Utc::now()),
            group_id,
            group.metadata.version,
        ],
    )?;
    if rows == 0 {
        return Err(Error::OptimisticLock);
    }

    let root_group_id = namespace::root_group_id(conn, &new_path)?;
    let pruned = cleaner::prune_relations(conn, &new_path)?.total();
    let reattributed = cleaner::refresh_root_group(conn, &new_path, &root_group_id)?;

    let group = groups::get_by_id(conn, group_id)?
        .ok_or_else(|| Error::Internal(format!("group {group_id} vanished during migration")))?;

    Ok(Migration {
        group,
        old_path,
        rewritten,
        pruned,
        reattributed,
    })
}
