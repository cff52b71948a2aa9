use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use tracing::info;
use uuid::Uuid;

use super::groups::{self, GetGroupsInput, GroupsResult};
use super::migration::{self, MigrationLimits};
use super::schema::SCHEMA;
use super::{Store, namespace, path, workspaces};
use crate::config::StoreConfig;
use crate::error::{Constraint, Error, Result, constraint_kind};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_group_depth: Option<usize>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
            max_group_depth: None,
        })
    }

    /// Opens the database under `config.data_dir`, creating the directory if
    /// needed, and applies the config's limits.
    pub fn with_config(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let mut store = Self::new(config.db_path())?;
        store
            .conn()
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        store.max_group_depth = config.max_group_depth;
        Ok(store)
    }

    #[must_use]
    pub fn with_max_group_depth(mut self, max: Option<usize>) -> Self {
        self.max_group_depth = max;
        self
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    /// Runs `f` in a write transaction, committing only if it succeeds.
    /// The write lock is taken at `BEGIN IMMEDIATE`, so contention waits on
    /// the busy timeout rather than failing on a lock upgrade.
    pub(crate) fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn check_depth(&self, full_path: &str) -> Result<()> {
        match self.max_group_depth {
            Some(max) if path::level(full_path) > max => Err(Error::invalid(format!(
                "group '{full_path}' would exceed the maximum nesting depth of {max}"
            ))),
            _ => Ok(()),
        }
    }
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn validate_id(id: &str) -> Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| Error::invalid(format!("'{id}' is not a valid resource ID")))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Maps a duplicate-path failure on a namespace insert to a readable conflict.
fn path_taken(full_path: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |e| match e {
        Error::Conflict(_) => Error::conflict(format!(
            "a group or workspace already exists at path '{full_path}'"
        )),
        other => other,
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Namespace registry

    fn get_namespace_by_path(&self, namespace_path: &str) -> Result<Option<Namespace>> {
        namespace::resolve_by_path(&self.conn(), namespace_path)
    }

    fn get_namespace_by_group_id(&self, group_id: &str) -> Result<Option<Namespace>> {
        validate_id(group_id)?;
        namespace::resolve_by_group_id(&self.conn(), group_id)
    }

    fn get_namespace_by_workspace_id(&self, workspace_id: &str) -> Result<Option<Namespace>> {
        validate_id(workspace_id)?;
        namespace::resolve_by_workspace_id(&self.conn(), workspace_id)
    }

    // Group operations

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    fn create_group(&self, input: &NewGroup) -> Result<Group> {
        path::validate_name(&input.name)?;
        if let Some(parent_id) = &input.parent_id {
            validate_id(parent_id)?;
        }

        let id = new_id();
        let now = format_datetime(&Utc::now());
        let runner_tags = groups::encode_runner_tags(input.runner_tags.as_ref())?;

        let group = self.in_transaction(|tx| {
            let parent_path = match &input.parent_id {
                Some(parent_id) => Some(namespace::group_path(tx, parent_id)?.ok_or_else(|| {
                    Error::conflict(format!("parent group {parent_id} does not exist"))
                })?),
                None => None,
            };
            let full_path = path::join(parent_path.as_deref(), &input.name);
            self.check_depth(&full_path)?;

            tx.execute(
                "INSERT INTO groups (id, version, created_at, updated_at, name, description,
                     parent_id, created_by, runner_tags, enable_drift_detection, enable_provider_mirror)
                 VALUES (?1, 1, ?2, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    now,
                    input.name,
                    input.description,
                    input.parent_id,
                    input.created_by,
                    runner_tags,
                    input.enable_drift_detection,
                    input.enable_provider_mirror,
                ],
            )?;

            namespace::insert(
                tx,
                &Namespace {
                    id: new_id(),
                    version: 1,
                    path: full_path.clone(),
                    owner: NamespaceOwner::Group(id.clone()),
                },
            )
            .map_err(path_taken(&full_path))?;

            groups::get_by_id(tx, &id)?
                .ok_or_else(|| Error::Internal(format!("group {id} missing after insert")))
        })?;

        info!(group_id = %group.metadata.id, path = %group.full_path, "Created group");
        Ok(group)
    }

    #[tracing::instrument(skip(self, group), fields(group_id = %group.metadata.id))]
    fn update_group(&self, group: &Group) -> Result<Group> {
        validate_id(&group.metadata.id)?;
        let runner_tags = groups::encode_runner_tags(group.runner_tags.as_ref())?;

        self.in_transaction(|tx| {
            let rows = tx.execute(
                "UPDATE groups SET description = ?1, runner_tags = ?2, enable_drift_detection = ?3,
                     enable_provider_mirror = ?4, version = version + 1, updated_at = ?5
                 WHERE id = ?6 AND version = ?7",
                params![
                    group.description,
                    runner_tags,
                    group.enable_drift_detection,
                    group.enable_provider_mirror,
                    format_datetime(&Utc::now()),
                    group.metadata.id,
                    group.metadata.version,
                ],
            )?;

            if rows == 0 {
                return Err(Error::OptimisticLock);
            }

            groups::get_by_id(tx, &group.metadata.id)?
                .ok_or_else(|| Error::Internal("group missing after update".to_string()))
        })
    }

    #[tracing::instrument(skip(self, group), fields(group_id = %group.metadata.id))]
    fn delete_group(&self, group: &Group) -> Result<()> {
        validate_id(&group.metadata.id)?;

        let rows = self
            .conn()
            .execute(
                "DELETE FROM groups WHERE id = ?1 AND version = ?2",
                params![group.metadata.id, group.metadata.version],
            )
            .map_err(|e| match constraint_kind(&e) {
                Some(Constraint::ForeignKey) => Error::conflict(format!(
                    "group '{}' still contains child groups or workspaces",
                    group.full_path
                )),
                _ => Error::from(e),
            })?;

        if rows == 0 {
            return Err(Error::OptimisticLock);
        }

        info!(path = %group.full_path, "Deleted group");
        Ok(())
    }

    fn get_group_by_id(&self, id: &str) -> Result<Option<Group>> {
        validate_id(id)?;
        groups::get_by_id(&self.conn(), id)
    }

    fn get_group_by_trn(&self, trn: &str) -> Result<Option<Group>> {
        let trn = Trn::parse_as(trn, TrnKind::Group)?;
        groups::get_by_path(&self.conn(), &trn.path)
    }

    fn get_group_by_full_path(&self, full_path: &str) -> Result<Option<Group>> {
        path::validate_path(full_path)?;
        groups::get_by_path(&self.conn(), full_path)
    }

    fn get_groups(&self, input: &GetGroupsInput) -> Result<GroupsResult> {
        groups::list(&self.conn(), input)
    }

    fn get_child_depth(&self, group: &Group) -> Result<usize> {
        validate_id(&group.metadata.id)?;
        groups::child_depth(&self.conn(), &group.metadata.id)
    }

    #[tracing::instrument(
        skip(self, group, new_parent),
        fields(group_id = %group.metadata.id, new_parent_id = ?new_parent.map(|p| &p.metadata.id))
    )]
    fn migrate_group(&self, group: &Group, new_parent: Option<&Group>) -> Result<Group> {
        validate_id(&group.metadata.id)?;

        let limits = MigrationLimits {
            max_group_depth: self.max_group_depth,
        };
        let migration =
            self.in_transaction(|tx| migration::migrate(tx, group, new_parent, limits))?;

        info!(
            from = %migration.old_path,
            to = %migration.group.full_path,
            namespaces = migration.rewritten,
            relations_removed = migration.pruned,
            resources_reattributed = migration.reattributed,
            "Migrated group"
        );
        Ok(migration.group)
    }

    // Workspace operations

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    fn create_workspace(&self, input: &NewWorkspace) -> Result<Workspace> {
        path::validate_name(&input.name)?;
        validate_id(&input.group_id)?;

        let id = new_id();
        let now = format_datetime(&Utc::now());

        let workspace = self.in_transaction(|tx| {
            let group_path = namespace::group_path(tx, &input.group_id)?.ok_or_else(|| {
                Error::conflict(format!("group {} does not exist", input.group_id))
            })?;
            let full_path = path::join(Some(&group_path), &input.name);

            tx.execute(
                "INSERT INTO workspaces (id, version, created_at, updated_at, name, description,
                     group_id, created_by)
                 VALUES (?1, 1, ?2, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    now,
                    input.name,
                    input.description,
                    input.group_id,
                    input.created_by,
                ],
            )?;

            namespace::insert(
                tx,
                &Namespace {
                    id: new_id(),
                    version: 1,
                    path: full_path.clone(),
                    owner: NamespaceOwner::Workspace(id.clone()),
                },
            )
            .map_err(path_taken(&full_path))?;

            workspaces::get_by_id(tx, &id)?
                .ok_or_else(|| Error::Internal(format!("workspace {id} missing after insert")))
        })?;

        info!(workspace_id = %workspace.metadata.id, path = %workspace.full_path, "Created workspace");
        Ok(workspace)
    }

    fn get_workspace_by_id(&self, id: &str) -> Result<Option<Workspace>> {
        validate_id(id)?;
        workspaces::get_by_id(&self.conn(), id)
    }

    fn get_workspace_by_trn(&self, trn: &str) -> Result<Option<Workspace>> {
        let trn = Trn::parse_as(trn, TrnKind::Workspace)?;
        workspaces::get_by_path(&self.conn(), &trn.path)
    }

    #[tracing::instrument(skip(self, workspace), fields(workspace_id = %workspace.metadata.id))]
    fn delete_workspace(&self, workspace: &Workspace) -> Result<()> {
        validate_id(&workspace.metadata.id)?;

        let rows = self.conn().execute(
            "DELETE FROM workspaces WHERE id = ?1 AND version = ?2",
            params![workspace.metadata.id, workspace.metadata.version],
        )?;

        if rows == 0 {
            return Err(Error::OptimisticLock);
        }

        info!(path = %workspace.full_path, "Deleted workspace");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn create(store: &SqliteStore, name: &str, parent: Option<&Group>) -> Group {
        store
            .create_group(&NewGroup {
                name: name.to_string(),
                parent_id: parent.map(|p| p.metadata.id.clone()),
                created_by: "tester".to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = open();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "groups",
            "workspaces",
            "namespaces",
            "namespace_memberships",
            "service_accounts",
            "runners",
            "service_account_runner_relation",
            "managed_identities",
            "workspace_managed_identity_relation",
            "vcs_providers",
            "workspace_vcs_provider_links",
            "terraform_providers",
            "terraform_modules",
            "terraform_provider_mirrors",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (_temp, store) = open();
        store.initialize().unwrap();
    }

    #[test]
    fn test_create_group_derives_path_and_trn() {
        let (_temp, store) = open();
        let root = create(&store, "platform", None);
        let child = create(&store, "network", Some(&root));

        assert_eq!(root.full_path, "platform");
        assert!(root.is_root());
        assert_eq!(root.metadata.version, 1);
        assert_eq!(child.full_path, "platform/network");
        assert_eq!(child.metadata.trn, "trn:group:platform/network");
        assert_eq!(child.parent_id.as_deref(), Some(root.metadata.id.as_str()));
        assert_eq!(child.root_path(), "platform");

        let ns = store
            .get_namespace_by_group_id(&child.metadata.id)
            .unwrap()
            .unwrap();
        assert_eq!(ns.path, "platform/network");
    }

    #[test]
    fn test_create_group_round_trips_fields() {
        let (_temp, store) = open();
        let group = store
            .create_group(&NewGroup {
                name: "ops".to_string(),
                description: "operations".to_string(),
                created_by: "tester".to_string(),
                runner_tags: Some(vec!["linux".to_string(), "gpu".to_string()]),
                enable_drift_detection: Some(true),
                enable_provider_mirror: Some(false),
                ..Default::default()
            })
            .unwrap();

        let fetched = store.get_group_by_id(&group.metadata.id).unwrap().unwrap();
        assert_eq!(fetched, group);
        assert_eq!(
            fetched.runner_tags,
            Some(vec!["linux".to_string(), "gpu".to_string()])
        );
        assert_eq!(fetched.enable_drift_detection, Some(true));
        assert_eq!(fetched.enable_provider_mirror, Some(false));
    }

    #[test]
    fn test_create_group_duplicate_sibling_conflicts() {
        let (_temp, store) = open();
        let root = create(&store, "a", None);
        create(&store, "b", Some(&root));

        let result = store.create_group(&NewGroup {
            name: "b".to_string(),
            parent_id: Some(root.metadata.id.clone()),
            created_by: "tester".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Conflict(_))));

        let groups = store.get_groups(&GetGroupsInput::default()).unwrap();
        assert_eq!(groups.page_info.total_count, 2);
    }

    #[test]
    fn test_create_group_missing_parent_conflicts() {
        let (_temp, store) = open();
        let result = store.create_group(&NewGroup {
            name: "orphan".to_string(),
            parent_id: Some(Uuid::new_v4().to_string()),
            created_by: "tester".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_create_group_invalid_name() {
        let (_temp, store) = open();
        let result = store.create_group(&NewGroup {
            name: "Not Valid".to_string(),
            created_by: "tester".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_create_group_respects_depth_limit() {
        let (_temp, store) = open();
        let store = store.with_max_group_depth(Some(2));
        let a = create(&store, "a", None);
        let b = create(&store, "b", Some(&a));

        let result = store.create_group(&NewGroup {
            name: "c".to_string(),
            parent_id: Some(b.metadata.id.clone()),
            created_by: "tester".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_update_group_optimistic_lock() {
        let (_temp, store) = open();
        let group = create(&store, "a", None);

        let mut edited = group.clone();
        edited.description = "first".to_string();
        let updated = store.update_group(&edited).unwrap();
        assert_eq!(updated.metadata.version, 2);
        assert_eq!(updated.description, "first");

        let mut stale = group.clone();
        stale.description = "second".to_string();
        let result = store.update_group(&stale);
        assert!(matches!(result, Err(Error::OptimisticLock)));

        let fetched = store.get_group_by_id(&group.metadata.id).unwrap().unwrap();
        assert_eq!(fetched.description, "first");
        assert_eq!(fetched.metadata.version, 2);
    }

    #[test]
    fn test_delete_group() {
        let (_temp, store) = open();
        let root = create(&store, "a", None);
        let child = create(&store, "b", Some(&root));

        let result = store.delete_group(&root);
        assert!(matches!(result, Err(Error::Conflict(_))));

        let mut stale = child.clone();
        stale.metadata.version = 7;
        assert!(matches!(
            store.delete_group(&stale),
            Err(Error::OptimisticLock)
        ));

        store.delete_group(&child).unwrap();
        assert!(store.get_group_by_id(&child.metadata.id).unwrap().is_none());
        assert!(store.get_namespace_by_path("a/b").unwrap().is_none());

        store.delete_group(&root).unwrap();
        assert!(store.get_group_by_full_path("a").unwrap().is_none());
    }

    #[test]
    fn test_delete_group_with_workspace_conflicts() {
        let (_temp, store) = open();
        let root = create(&store, "a", None);
        let ws = store
            .create_workspace(&NewWorkspace {
                name: "w".to_string(),
                group_id: root.metadata.id.clone(),
                created_by: "tester".to_string(),
                ..Default::default()
            })
            .unwrap();

        assert!(matches!(store.delete_group(&root), Err(Error::Conflict(_))));

        store.delete_workspace(&ws).unwrap();
        store.delete_group(&root).unwrap();
    }

    #[test]
    fn test_lookups() {
        let (_temp, store) = open();
        let root = create(&store, "a", None);
        let child = create(&store, "b", Some(&root));

        let by_trn = store.get_group_by_trn("trn:group:a/b").unwrap().unwrap();
        assert_eq!(by_trn.metadata.id, child.metadata.id);
        assert!(store.get_group_by_trn("trn:group:a/x").unwrap().is_none());
        assert!(matches!(
            store.get_group_by_trn("a/b"),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            store.get_group_by_id("not-a-uuid"),
            Err(Error::Invalid(_))
        ));
        assert!(
            store
                .get_group_by_id(&Uuid::new_v4().to_string())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_workspace_crud() {
        let (_temp, store) = open();
        let root = create(&store, "a", None);
        let ws = store
            .create_workspace(&NewWorkspace {
                name: "prod".to_string(),
                description: "production".to_string(),
                group_id: root.metadata.id.clone(),
                created_by: "tester".to_string(),
            })
            .unwrap();

        assert_eq!(ws.full_path, "a/prod");
        assert_eq!(ws.metadata.trn, "trn:workspace:a/prod");

        let by_trn = store
            .get_workspace_by_trn("trn:workspace:a/prod")
            .unwrap()
            .unwrap();
        assert_eq!(by_trn, ws);

        let ns = store.get_namespace_by_path("a/prod").unwrap().unwrap();
        assert_eq!(ns.workspace_id(), Some(ws.metadata.id.as_str()));

        // A group cannot take a workspace's path.
        let result = store.create_group(&NewGroup {
            name: "prod".to_string(),
            parent_id: Some(root.metadata.id.clone()),
            created_by: "tester".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_child_depth() {
        let (_temp, store) = open();
        let a = create(&store, "a", None);
        assert_eq!(store.get_child_depth(&a).unwrap(), 0);

        let b = create(&store, "b", Some(&a));
        let c = create(&store, "c", Some(&a));
        let d = create(&store, "d", Some(&c));
        create(&store, "e", Some(&d));

        assert_eq!(store.get_child_depth(&a).unwrap(), 3);
        assert_eq!(store.get_child_depth(&b).unwrap(), 0);
        assert_eq!(store.get_child_depth(&c).unwrap(), 2);
    }

    #[test]
    fn test_transactions_take_write_lock_up_front() {
        let (temp, store) = open();
        let other = Connection::open(temp.path().join("test.db")).unwrap();
        other.busy_timeout(Duration::ZERO).unwrap();

        store
            .in_transaction(|tx| {
                tx.query_row("SELECT COUNT(*) FROM groups", [], |row| row.get::<_, i64>(0))?;
                let err = other.execute_batch("BEGIN IMMEDIATE;").unwrap_err();
                assert!(matches!(
                    err,
                    rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DatabaseBusy
                ));
                Ok(())
            })
            .unwrap();

        other.execute_batch("BEGIN IMMEDIATE; COMMIT;").unwrap();
    }
}
