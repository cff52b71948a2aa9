//! Removes relations whose home group is no longer an ancestor of their
//! target after a subtree moves, and re-derives `root_group_id` on registry
//! resources.
//!
//! Only service-account and group-scoped bindings are pruned. User and team
//! memberships are independent grants and survive any move.

use rusqlite::{Connection, params};

use super::namespace::{ancestor_or_equal_predicate, subtree_predicate};
use crate::error::Result;
use crate::types::RegistryResourceKind;

/// A relation table joined to the namespace of the binding's home group
/// (aliased `home`) and the namespace of its target (aliased `target`).
struct Relation {
    kind: &'static str,
    table: &'static str,
    source: &'static str,
}

const RELATIONS: [Relation; 4] = [
    Relation {
        kind: "managed identity assignment",
        table: "workspace_managed_identity_relation",
        source: "workspace_managed_identity_relation r
                 JOIN managed_identities h ON h.id = r.managed_identity_id
                 JOIN namespaces home ON home.group_id = h.group_id
                 JOIN namespaces target ON target.workspace_id = r.workspace_id",
    },
    Relation {
        kind: "service account runner assignment",
        table: "service_account_runner_relation",
        source: "service_account_runner_relation r
                 JOIN service_accounts h ON h.id = r.service_account_id
                 JOIN namespaces home ON home.group_id = h.group_id
                 JOIN runners t ON t.id = r.runner_id
                 JOIN namespaces target ON target.group_id = t.group_id",
    },
    Relation {
        kind: "service account membership",
        table: "namespace_memberships",
        source: "namespace_memberships r
                 JOIN service_accounts h ON h.id = r.service_account_id
                 JOIN namespaces home ON home.group_id = h.group_id
                 JOIN namespaces target ON target.id = r.namespace_id",
    },
    Relation {
        kind: "workspace VCS provider link",
        table: "workspace_vcs_provider_links",
        source: "workspace_vcs_provider_links r
                 JOIN vcs_providers h ON h.id = r.provider_id
                 JOIN namespaces home ON home.group_id = h.group_id
                 JOIN namespaces target ON target.workspace_id = r.workspace_id",
    },
];

/// Rows removed per relation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PruneReport {
    pub(crate) removed: Vec<(&'static str, usize)>,
}

impl PruneReport {
    #[must_use]
    pub(crate) fn total(&self) -> usize {
        self.removed.iter().map(|(_, n)| n).sum()
    }
}

/// Deletes every relation touching the subtree at `subtree_path` (either
/// endpoint under it) whose home path is not the target path or one of its
/// ancestors. Relations that still satisfy the ancestry rule are kept.
pub(crate) fn prune_relations(conn: &Connection, subtree_path: &str) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    for relation in &RELATIONS {
        let sql = format!(
            "DELETE FROM {table} WHERE rowid IN (
                 SELECT r.rowid FROM {source}
                 WHERE ({target_in} OR {home_in})
                   AND NOT {valid}
             )",
            table = relation.table,
            source = relation.source,
            target_in = subtree_predicate("target.path", 1),
            home_in = subtree_predicate("home.path", 1),
            valid = ancestor_or_equal_predicate("home.path", "target.path"),
        );

        let removed = conn.execute(&sql, params![subtree_path])?;
        if removed > 0 {
            tracing::info!(
                relation = relation.kind,
                removed,
                subtree = subtree_path,
                "Removed relations invalidated by group migration"
            );
        }
        report.removed.push((relation.kind, removed));
    }

    Ok(report)
}

/// Points `root_group_id` at `root_group_id` for every registry resource whose
/// group lies under `subtree_path`. Returns the number of rows changed.
pub(crate) fn refresh_root_group(
    conn: &Connection,
    subtree_path: &str,
    root_group_id: &str,
) -> Result<usize> {
    let mut updated = 0;

    for kind in RegistryResourceKind::ALL {
        let sql = format!(
            "UPDATE {table} SET root_group_id = ?1
             WHERE root_group_id <> ?1
               AND group_id IN (
                   SELECT group_id FROM namespaces
                   WHERE group_id IS NOT NULL AND {in_subtree}
               )",
            table = kind.table(),
            in_subtree = subtree_predicate("path", 2),
        );
        updated += conn.execute(&sql, params![root_group_id, subtree_path])?;
    }

    tracing::debug!(subtree = subtree_path, root_group_id, updated, "Refreshed root group");
    Ok(updated)
}
