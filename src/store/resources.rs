//! Group-scoped resources and the bindings between them.
//!
//! These only support creating and reading rows. Their lifecycle is owned
//! elsewhere; the hierarchy needs them so migrations can keep bindings and
//! root-group attribution consistent.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::sqlite::{SqliteStore, format_datetime, validate_id};
use super::{namespace, path};
use crate::error::{Error, Result};
use crate::types::*;

/// Inserts an `(id, name, group_id)` row into one of the scoped resource
/// tables and returns the new ID.
fn insert_scoped(conn: &Connection, table: &str, group_id: &str, name: &str) -> Result<String> {
    validate_id(group_id)?;
    path::validate_name(name)?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        &format!("INSERT INTO {table} (id, name, group_id, created_at) VALUES (?1, ?2, ?3, ?4)"),
        params![id, name, group_id, format_datetime(&Utc::now())],
    )?;
    Ok(id)
}

fn list_ids(conn: &Connection, sql: &str, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![key], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Current path of the group owning row `id` in one of the scoped resource
/// tables.
fn home_path(conn: &Connection, table: &str, id: &str, what: &str) -> Result<String> {
    conn.query_row(
        &format!(
            "SELECT n.path FROM {table} r JOIN namespaces n ON n.group_id = r.group_id
             WHERE r.id = ?1"
        ),
        params![id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::conflict(format!("{what} {id} does not exist")))
}

fn workspace_path(conn: &Connection, workspace_id: &str) -> Result<String> {
    namespace::resolve_by_workspace_id(conn, workspace_id)?
        .map(|ns| ns.path)
        .ok_or_else(|| Error::conflict(format!("workspace {workspace_id} does not exist")))
}

/// A binding is only valid while its home group is the target's namespace or
/// one of its ancestors.
fn require_ancestry(home: &str, target: &str, what: &str) -> Result<()> {
    if path::is_ancestor_or_equal(home, target) {
        Ok(())
    } else {
        Err(Error::conflict(format!(
            "{what} in '{home}' cannot be bound to '{target}', which is outside its group"
        )))
    }
}

impl SqliteStore {
    // Scoped resources

    pub fn create_service_account(&self, group_id: &str, name: &str) -> Result<ServiceAccount> {
        let id = insert_scoped(&self.connection(), "service_accounts", group_id, name)?;
        Ok(ServiceAccount {
            id,
            name: name.to_string(),
            group_id: group_id.to_string(),
        })
    }

    pub fn create_runner(&self, group_id: &str, name: &str) -> Result<Runner> {
        let id = insert_scoped(&self.connection(), "runners", group_id, name)?;
        Ok(Runner {
            id,
            name: name.to_string(),
            group_id: group_id.to_string(),
        })
    }

    pub fn create_managed_identity(&self, group_id: &str, name: &str) -> Result<ManagedIdentity> {
        let id = insert_scoped(&self.connection(), "managed_identities", group_id, name)?;
        Ok(ManagedIdentity {
            id,
            name: name.to_string(),
            group_id: group_id.to_string(),
        })
    }

    pub fn create_vcs_provider(&self, group_id: &str, name: &str) -> Result<VcsProvider> {
        let id = insert_scoped(&self.connection(), "vcs_providers", group_id, name)?;
        Ok(VcsProvider {
            id,
            name: name.to_string(),
            group_id: group_id.to_string(),
        })
    }

    // Relations

    pub fn assign_service_account_to_runner(
        &self,
        service_account_id: &str,
        runner_id: &str,
    ) -> Result<()> {
        self.in_transaction(|tx| {
            let home = home_path(tx, "service_accounts", service_account_id, "service account")?;
            let target = home_path(tx, "runners", runner_id, "runner")?;
            require_ancestry(&home, &target, "service account")?;

            tx.execute(
                "INSERT INTO service_account_runner_relation (service_account_id, runner_id)
                 VALUES (?1, ?2)",
                params![service_account_id, runner_id],
            )?;
            Ok(())
        })
    }

    /// Service account IDs assigned to a runner.
    pub fn list_runner_service_accounts(&self, runner_id: &str) -> Result<Vec<String>> {
        list_ids(
            &self.connection(),
            "SELECT service_account_id FROM service_account_runner_relation
             WHERE runner_id = ?1 ORDER BY service_account_id",
            runner_id,
        )
    }

    pub fn assign_managed_identity_to_workspace(
        &self,
        managed_identity_id: &str,
        workspace_id: &str,
    ) -> Result<()> {
        self.in_transaction(|tx| {
            let home = home_path(
                tx,
                "managed_identities",
                managed_identity_id,
                "managed identity",
            )?;
            require_ancestry(&home, &workspace_path(tx, workspace_id)?, "managed identity")?;

            tx.execute(
                "INSERT INTO workspace_managed_identity_relation (managed_identity_id, workspace_id)
                 VALUES (?1, ?2)",
                params![managed_identity_id, workspace_id],
            )?;
            Ok(())
        })
    }

    /// Managed identity IDs assigned to a workspace.
    pub fn list_workspace_managed_identities(&self, workspace_id: &str) -> Result<Vec<String>> {
        list_ids(
            &self.connection(),
            "SELECT managed_identity_id FROM workspace_managed_identity_relation
             WHERE workspace_id = ?1 ORDER BY managed_identity_id",
            workspace_id,
        )
    }

    pub fn link_workspace_to_vcs_provider(
        &self,
        workspace_id: &str,
        provider_id: &str,
        repository_path: &str,
    ) -> Result<WorkspaceVcsProviderLink> {
        let link = WorkspaceVcsProviderLink {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            provider_id: provider_id.to_string(),
            repository_path: repository_path.to_string(),
        };
        self.in_transaction(|tx| {
            let home = home_path(tx, "vcs_providers", provider_id, "VCS provider")?;
            require_ancestry(&home, &workspace_path(tx, workspace_id)?, "VCS provider")?;

            tx.execute(
                "INSERT INTO workspace_vcs_provider_links (id, workspace_id, provider_id, repository_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    link.id,
                    link.workspace_id,
                    link.provider_id,
                    link.repository_path,
                    format_datetime(&Utc::now()),
                ],
            )?;
            Ok(())
        })?;
        Ok(link)
    }

    pub fn get_workspace_vcs_provider_link(
        &self,
        workspace_id: &str,
    ) -> Result<Option<WorkspaceVcsProviderLink>> {
        self.connection()
            .query_row(
                "SELECT id, workspace_id, provider_id, repository_path
                 FROM workspace_vcs_provider_links WHERE workspace_id = ?1",
                params![workspace_id],
                |row| {
                    Ok(WorkspaceVcsProviderLink {
                        id: row.get(0)?,
                        workspace_id: row.get(1)?,
                        provider_id: row.get(2)?,
                        repository_path: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn add_namespace_membership(
        &self,
        namespace_path: &str,
        member: &Member,
        role: &str,
    ) -> Result<NamespaceMembership> {
        let (user_id, team_id, service_account_id) = match member {
            Member::User(id) => (Some(id), None, None),
            Member::Team(id) => (None, Some(id), None),
            Member::ServiceAccount(id) => (None, None, Some(id)),
        };

        self.in_transaction(|tx| {
            let ns = namespace::resolve_by_path(tx, namespace_path)?.ok_or_else(|| {
                Error::conflict(format!("namespace '{namespace_path}' does not exist"))
            })?;

            // User and team grants are independent of group ancestry.
            if let Some(sa_id) = service_account_id {
                let home = home_path(tx, "service_accounts", sa_id, "service account")?;
                require_ancestry(&home, &ns.path, "service account")?;
            }

            let membership = NamespaceMembership {
                id: Uuid::new_v4().to_string(),
                namespace_id: ns.id,
                member: member.clone(),
                role: role.to_string(),
            };
            tx.execute(
                "INSERT INTO namespace_memberships (id, namespace_id, user_id, team_id, service_account_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    membership.id,
                    membership.namespace_id,
                    user_id,
                    team_id,
                    service_account_id,
                    membership.role,
                    format_datetime(&Utc::now()),
                ],
            )?;
            Ok(membership)
        })
    }

    pub fn list_namespace_memberships(&self, namespace_path: &str) -> Result<Vec<NamespaceMembership>> {
        path::validate_path(namespace_path)?;
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.namespace_id, m.user_id, m.team_id, m.service_account_id, m.role
             FROM namespace_memberships m JOIN namespaces n ON n.id = m.namespace_id
             WHERE n.path = ?1 ORDER BY m.created_at, m.id",
        )?;

        let rows = stmt.query_map(params![namespace_path], |row| {
            let user_id: Option<String> = row.get(2)?;
            let team_id: Option<String> = row.get(3)?;
            let service_account_id: Option<String> = row.get(4)?;
            let member = match (user_id, team_id, service_account_id) {
                (Some(id), _, _) => Member::User(id),
                (_, Some(id), _) => Member::Team(id),
                (_, _, Some(id)) => Member::ServiceAccount(id),
                _ => {
                    return Err(rusqlite::Error::InvalidColumnType(
                        2,
                        "user_id".to_string(),
                        rusqlite::types::Type::Null,
                    ));
                }
            };
            Ok(NamespaceMembership {
                id: row.get(0)?,
                namespace_id: row.get(1)?,
                member,
                role: row.get(5)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Registry resources

    /// Creates a provider, module or mirror in `group_id`, attributing it to
    /// the group's current root.
    pub fn create_registry_resource(
        &self,
        kind: RegistryResourceKind,
        group_id: &str,
        name: &str,
    ) -> Result<RegistryResource> {
        validate_id(group_id)?;
        path::validate_name(name)?;

        let conn = self.connection();
        let group_path = namespace::group_path(&conn, group_id)?
            .ok_or_else(|| Error::conflict(format!("group {group_id} does not exist")))?;
        let root_group_id = namespace::root_group_id(&conn, &group_path)?;

        let resource = RegistryResource {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            group_id: group_id.to_string(),
            root_group_id,
        };
        conn.execute(
            &format!(
                "INSERT INTO {} (id, name, group_id, root_group_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                kind.table()
            ),
            params![
                resource.id,
                resource.name,
                resource.group_id,
                resource.root_group_id,
                format_datetime(&Utc::now()),
            ],
        )?;
        Ok(resource)
    }

    pub fn get_registry_resource(
        &self,
        kind: RegistryResourceKind,
        id: &str,
    ) -> Result<Option<RegistryResource>> {
        validate_id(id)?;
        self.connection()
            .query_row(
                &format!(
                    "SELECT id, name, group_id, root_group_id FROM {} WHERE id = ?1",
                    kind.table()
                ),
                params![id],
                |row| {
                    Ok(RegistryResource {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        group_id: row.get(2)?,
                        root_group_id: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }
}
