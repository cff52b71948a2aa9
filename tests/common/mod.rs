#![allow(dead_code)]

use canopy::store::{SqliteStore, Store};
use canopy::types::{Group, NewGroup, NewWorkspace, Workspace};
use tempfile::TempDir;

/// A freshly initialized store in its own temp directory.
pub struct TestStore {
    _temp_dir: TempDir,
    pub store: SqliteStore,
}

impl TestStore {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("canopy.db")).expect("open store");
        store.initialize().expect("initialize store");
        Self {
            _temp_dir: temp_dir,
            store,
        }
    }

    pub fn with_max_group_depth(max: usize) -> Self {
        let Self { _temp_dir, store } = Self::new();
        Self {
            _temp_dir,
            store: store.with_max_group_depth(Some(max)),
        }
    }

    pub fn group(&self, name: &str, parent: Option<&Group>) -> Group {
        self.store
            .create_group(&NewGroup {
                name: name.to_string(),
                parent_id: parent.map(|p| p.metadata.id.clone()),
                created_by: "tester".to_string(),
                ..Default::default()
            })
            .expect("create group")
    }

    pub fn workspace(&self, name: &str, group: &Group) -> Workspace {
        self.store
            .create_workspace(&NewWorkspace {
                name: name.to_string(),
                group_id: group.metadata.id.clone(),
                created_by: "tester".to_string(),
                ..Default::default()
            })
            .expect("create workspace")
    }

    /// Inserts a runner assignment row directly, the way rows written before
    /// ancestry was enforced at assignment time look.
    pub fn seed_runner_assignment(&self, service_account_id: &str, runner_id: &str) {
        self.store
            .connection()
            .execute(
                "INSERT INTO service_account_runner_relation (service_account_id, runner_id)
                 VALUES (?1, ?2)",
                rusqlite::params![service_account_id, runner_id],
            )
            .expect("seed runner assignment");
    }

    /// Re-reads a group so its version is current.
    pub fn reload(&self, group: &Group) -> Group {
        self.store
            .get_group_by_id(&group.metadata.id)
            .expect("get group")
            .expect("group exists")
    }

    pub fn path_of(&self, group: &Group) -> String {
        self.reload(group).full_path
    }

    pub fn workspace_path(&self, workspace: &Workspace) -> String {
        self.store
            .get_workspace_by_id(&workspace.metadata.id)
            .expect("get workspace")
            .expect("workspace exists")
            .full_path
    }
}
