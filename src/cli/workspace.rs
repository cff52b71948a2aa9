use crate::config::StoreConfig;
use crate::store::Store;
use crate::store::path::{normalize_path, parent_path};
use crate::types::{NewWorkspace, Trn};

use super::{confirm_action, init_store, require_group};

pub fn run_workspace_create(
    config: &StoreConfig,
    path: String,
    description: String,
    created_by: String,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let path = normalize_path(&path)?;

    let group_path = parent_path(&path)
        .ok_or_else(|| anyhow::anyhow!("Workspace path must include its group, e.g. 'group/{path}'"))?;
    let group = require_group(&store, group_path)?;
    let name = path.rsplit('/').next().unwrap_or(&path).to_string();

    let workspace = store.create_workspace(&NewWorkspace {
        name,
        description,
        group_id: group.metadata.id,
        created_by,
    })?;

    println!();
    println!(
        "Created workspace \"{}\" ({})",
        workspace.full_path, workspace.metadata.id
    );
    println!();

    Ok(())
}

pub fn run_workspace_delete(
    config: &StoreConfig,
    path: String,
    non_interactive: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let path = normalize_path(&path)?;

    let workspace = store
        .get_workspace_by_trn(&Trn::workspace(&path).to_string())?
        .ok_or_else(|| anyhow::anyhow!("Workspace not found: {}", path))?;

    let confirmed = confirm_action(
        &format!("Delete workspace '{}'?", workspace.full_path),
        yes,
        non_interactive,
    )?;

    if !confirmed {
        println!("Cancelled.");
        return Ok(());
    }

    store.delete_workspace(&workspace)?;

    println!();
    println!("Deleted workspace '{}'", workspace.full_path);
    println!();

    Ok(())
}
