mod cleaner;
mod groups;
mod migration;
pub mod namespace;
mod pagination;
pub mod path;
mod resources;
mod schema;
mod sqlite;
mod workspaces;

pub use groups::{GetGroupsInput, GroupFilter, GroupSortableField, GroupsResult};
pub use pagination::{PageInfo, PaginationOptions};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Writes on versioned resources are compare-and-swap on `(id, version)`: a
/// stale version fails with `Error::OptimisticLock` and changes nothing.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Namespace registry
    fn get_namespace_by_path(&self, path: &str) -> Result<Option<Namespace>>;
    fn get_namespace_by_group_id(&self, group_id: &str) -> Result<Option<Namespace>>;
    fn get_namespace_by_workspace_id(&self, workspace_id: &str) -> Result<Option<Namespace>>;

    // Group operations
    fn create_group(&self, group: &NewGroup) -> Result<Group>;
    fn update_group(&self, group: &Group) -> Result<Group>;
    fn delete_group(&self, group: &Group) -> Result<()>;
    fn get_group_by_id(&self, id: &str) -> Result<Option<Group>>;
    fn get_group_by_trn(&self, trn: &str) -> Result<Option<Group>>;
    fn get_group_by_full_path(&self, full_path: &str) -> Result<Option<Group>>;
    fn get_groups(&self, input: &GetGroupsInput) -> Result<GroupsResult>;

    /// Depth of the descendant tree below `group`, excluding the group itself.
    fn get_child_depth(&self, group: &Group) -> Result<usize>;

    /// Moves `group` and its whole subtree under `new_parent`, or to the top
    /// level when `None`. Rewrites descendant paths, prunes relations that no
    /// longer satisfy the ancestry rule and re-derives root-group attribution,
    /// all atomically.
    fn migrate_group(&self, group: &Group, new_parent: Option<&Group>) -> Result<Group>;

    // Workspace operations
    fn create_workspace(&self, workspace: &NewWorkspace) -> Result<Workspace>;
    fn get_workspace_by_id(&self, id: &str) -> Result<Option<Workspace>>;
    fn get_workspace_by_trn(&self, trn: &str) -> Result<Option<Workspace>>;
    fn delete_workspace(&self, workspace: &Workspace) -> Result<()>;
}
