pub const SCHEMA: &str = r#"
-- Groups form a tree through parent_id. A group with children cannot be deleted.
CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    parent_id TEXT REFERENCES groups(id),
    created_by TEXT NOT NULL,
    runner_tags TEXT,                  -- JSON array, NULL = inherit
    enable_drift_detection INTEGER,    -- NULL = inherit
    enable_provider_mirror INTEGER     -- NULL = inherit
);

-- Workspaces are always leaves owned by a group.
CREATE TABLE IF NOT EXISTS workspaces (
    id TEXT PRIMARY KEY,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    group_id TEXT NOT NULL REFERENCES groups(id),
    created_by TEXT NOT NULL
);

-- Materialized paths. Each row belongs to exactly one group or workspace.
CREATE TABLE IF NOT EXISTS namespaces (
    id TEXT PRIMARY KEY,
    version INTEGER NOT NULL DEFAULT 1,
    path TEXT NOT NULL UNIQUE,
    group_id TEXT UNIQUE REFERENCES groups(id) ON DELETE CASCADE,
    workspace_id TEXT UNIQUE REFERENCES workspaces(id) ON DELETE CASCADE,
    CHECK ((group_id IS NULL) <> (workspace_id IS NULL))
);

CREATE TABLE IF NOT EXISTS namespace_memberships (
    id TEXT PRIMARY KEY,
    namespace_id TEXT NOT NULL REFERENCES namespaces(id) ON DELETE CASCADE,
    user_id TEXT,
    team_id TEXT,
    service_account_id TEXT REFERENCES service_accounts(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    CHECK ((user_id IS NOT NULL) + (team_id IS NOT NULL) + (service_account_id IS NOT NULL) = 1)
);

CREATE TABLE IF NOT EXISTS service_accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE(group_id, name)
);

CREATE TABLE IF NOT EXISTS runners (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE(group_id, name)
);

CREATE TABLE IF NOT EXISTS service_account_runner_relation (
    service_account_id TEXT NOT NULL REFERENCES service_accounts(id) ON DELETE CASCADE,
    runner_id TEXT NOT NULL REFERENCES runners(id) ON DELETE CASCADE,
    PRIMARY KEY (service_account_id, runner_id)
);

CREATE TABLE IF NOT EXISTS managed_identities (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE(group_id, name)
);

CREATE TABLE IF NOT EXISTS workspace_managed_identity_relation (
    managed_identity_id TEXT NOT NULL REFERENCES managed_identities(id) ON DELETE CASCADE,
    workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    PRIMARY KEY (managed_identity_id, workspace_id)
);

CREATE TABLE IF NOT EXISTS vcs_providers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE(group_id, name)
);

-- A workspace links to at most one VCS provider.
CREATE TABLE IF NOT EXISTS workspace_vcs_provider_links (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL UNIQUE REFERENCES workspaces(id) ON DELETE CASCADE,
    provider_id TEXT NOT NULL REFERENCES vcs_providers(id) ON DELETE CASCADE,
    repository_path TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Registry resources keep a denormalized root_group_id for fast filtering.
CREATE TABLE IF NOT EXISTS terraform_providers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    root_group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE(root_group_id, name)
);

CREATE TABLE IF NOT EXISTS terraform_modules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    root_group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS terraform_provider_mirrors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    root_group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_groups_parent ON groups(parent_id);
CREATE INDEX IF NOT EXISTS idx_workspaces_group ON workspaces(group_id);
CREATE INDEX IF NOT EXISTS idx_memberships_namespace ON namespace_memberships(namespace_id);
CREATE INDEX IF NOT EXISTS idx_memberships_service_account ON namespace_memberships(service_account_id);
CREATE INDEX IF NOT EXISTS idx_service_accounts_group ON service_accounts(group_id);
CREATE INDEX IF NOT EXISTS idx_runners_group ON runners(group_id);
CREATE INDEX IF NOT EXISTS idx_sa_runner_runner ON service_account_runner_relation(runner_id);
CREATE INDEX IF NOT EXISTS idx_managed_identities_group ON managed_identities(group_id);
CREATE INDEX IF NOT EXISTS idx_ws_identity_workspace ON workspace_managed_identity_relation(workspace_id);
CREATE INDEX IF NOT EXISTS idx_vcs_providers_group ON vcs_providers(group_id);
CREATE INDEX IF NOT EXISTS idx_vcs_links_provider ON workspace_vcs_provider_links(provider_id);
CREATE INDEX IF NOT EXISTS idx_tf_providers_group ON terraform_providers(group_id);
CREATE INDEX IF NOT EXISTS idx_tf_modules_group ON terraform_modules(group_id);
CREATE INDEX IF NOT EXISTS idx_tf_mirrors_group ON terraform_provider_mirrors(group_id);
"#;
