mod commands;
mod group;
mod workspace;

use std::path::PathBuf;

pub use commands::{GroupCommands, SortArg, WorkspaceCommands};
pub use group::{
    run_group_create, run_group_delete, run_group_depth, run_group_get, run_group_list,
    run_group_move,
};
pub use workspace::{run_workspace_create, run_workspace_delete};

use crate::config::StoreConfig;
use crate::store::{SqliteStore, Store};
use crate::types::Group;

/// Builds the effective config: the `--config` file (or defaults), with
/// `--data-dir` taking precedence.
pub fn resolve_config(
    config_file: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<StoreConfig> {
    let mut config = match config_file {
        Some(path) => StoreConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

/// Creates the data directory and database schema.
pub fn run_init(config: &StoreConfig) -> anyhow::Result<()> {
    let store = SqliteStore::with_config(config)?;
    store.initialize()?;

    println!();
    println!("Initialized database at {}", config.db_path().display());
    println!();

    Ok(())
}

/// Initialize store from data directory, checking it exists
pub fn init_store(config: &StoreConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'canopy init' first.",
            db_path.display()
        );
    }

    SqliteStore::with_config(config).map_err(Into::into)
}

pub(crate) fn require_group(store: &SqliteStore, path: &str) -> anyhow::Result<Group> {
    let path = crate::store::path::normalize_path(path)?;
    store
        .get_group_by_full_path(&path)?
        .ok_or_else(|| anyhow::anyhow!("Group not found: {}", path))
}

pub(crate) fn confirm_action(message: &str, yes: bool, non_interactive: bool) -> anyhow::Result<bool> {
    if yes {
        Ok(true)
    } else if non_interactive {
        anyhow::bail!("--yes is required for destructive operations in non-interactive mode");
    } else {
        Ok(inquire::Confirm::new(message)
            .with_default(false)
            .prompt()?)
    }
}
