use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields shared by every versioned resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub id: String,
    pub version: i64,
    pub trn: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub metadata: ResourceMetadata,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub full_path: String,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_drift_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_provider_mirror: Option<bool>,
}

impl Group {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Path of the topmost ancestor (the group itself when it is a root).
    #[must_use]
    pub fn root_path(&self) -> &str {
        crate::store::path::root_segment(&self.full_path)
    }
}

/// Input for creating a group. Identity, version, path and TRN are assigned
/// by the store.
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub created_by: String,
    pub runner_tags: Option<Vec<String>>,
    pub enable_drift_detection: Option<bool>,
    pub enable_provider_mirror: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub metadata: ResourceMetadata,
    pub name: String,
    pub description: String,
    pub group_id: String,
    pub full_path: String,
    pub created_by: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewWorkspace {
    pub name: String,
    pub description: String,
    pub group_id: String,
    pub created_by: String,
}

/// The entity that owns a namespace row. Exactly one per namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NamespaceOwner {
    Group(String),
    Workspace(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: String,
    pub version: i64,
    pub path: String,
    pub owner: NamespaceOwner,
}

impl Namespace {
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        match &self.owner {
            NamespaceOwner::Group(id) => Some(id),
            NamespaceOwner::Workspace(_) => None,
        }
    }

    #[must_use]
    pub fn workspace_id(&self) -> Option<&str> {
        match &self.owner {
            NamespaceOwner::Workspace(id) => Some(id),
            NamespaceOwner::Group(_) => None,
        }
    }
}

// Resources scoped to a home group. Only the fields the hierarchy cares about
// are modelled here.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub id: String,
    pub name: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    pub id: String,
    pub name: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedIdentity {
    pub id: String,
    pub name: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsProvider {
    pub id: String,
    pub name: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceVcsProviderLink {
    pub id: String,
    pub workspace_id: String,
    pub provider_id: String,
    pub repository_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Member {
    User(String),
    Team(String),
    ServiceAccount(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceMembership {
    pub id: String,
    pub namespace_id: String,
    pub member: Member,
    pub role: String,
}

/// Resources carrying a denormalized `root_group_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryResourceKind {
    TerraformProvider,
    TerraformModule,
    ProviderMirror,
}

impl RegistryResourceKind {
    pub const ALL: [RegistryResourceKind; 3] = [
        RegistryResourceKind::TerraformProvider,
        RegistryResourceKind::TerraformModule,
        RegistryResourceKind::ProviderMirror,
    ];

    pub(crate) const fn table(self) -> &'static str {
        match self {
            RegistryResourceKind::TerraformProvider => "terraform_providers",
            RegistryResourceKind::TerraformModule => "terraform_modules",
            RegistryResourceKind::ProviderMirror => "terraform_provider_mirrors",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryResource {
    pub id: String,
    pub name: String,
    pub group_id: String,
    pub root_group_id: String,
}
