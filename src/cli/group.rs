use serde::Serialize;

use crate::config::StoreConfig;
use crate::store::path::{normalize_path, parent_path};
use crate::store::{GetGroupsInput, GroupFilter, PaginationOptions, Store};
use crate::types::{Group, NewGroup};

use super::{SortArg, confirm_action, init_store, require_group};

#[derive(Serialize)]
struct GroupOutput<'a> {
    id: &'a str,
    path: &'a str,
    trn: &'a str,
    version: i64,
    description: &'a str,
    created_at: String,
    updated_at: String,
}

impl<'a> From<&'a Group> for GroupOutput<'a> {
    fn from(group: &'a Group) -> Self {
        Self {
            id: &group.metadata.id,
            path: &group.full_path,
            trn: &group.metadata.trn,
            version: group.metadata.version,
            description: &group.description,
            created_at: group.metadata.created_at.to_rfc3339(),
            updated_at: group.metadata.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
struct GroupListOutput<'a> {
    groups: Vec<GroupOutput<'a>>,
    total_count: i64,
    has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_cursor: Option<&'a str>,
}

pub fn run_group_create(
    config: &StoreConfig,
    path: String,
    description: String,
    created_by: String,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let path = normalize_path(&path)?;

    let parent_id = match parent_path(&path) {
        Some(parent) => Some(require_group(&store, parent)?.metadata.id),
        None => None,
    };
    let name = path.rsplit('/').next().unwrap_or(&path).to_string();

    let group = store.create_group(&NewGroup {
        name,
        description,
        parent_id,
        created_by,
        ..Default::default()
    })?;

    println!();
    println!("Created group \"{}\" ({})", group.full_path, group.metadata.id);
    println!();

    Ok(())
}

pub fn run_group_get(config: &StoreConfig, path: String, json: bool) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let group = require_group(&store, &path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&GroupOutput::from(&group))?);
        return Ok(());
    }

    let depth = store.get_child_depth(&group)?;
    println!();
    println!("Group:       {}", group.full_path);
    println!("ID:          {}", group.metadata.id);
    println!("TRN:         {}", group.metadata.trn);
    println!("Version:     {}", group.metadata.version);
    if !group.description.is_empty() {
        println!("Description: {}", group.description);
    }
    println!("Child depth: {depth}");
    println!();

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn run_group_list(
    config: &StoreConfig,
    parent: Option<String>,
    search: Option<String>,
    root_only: bool,
    sort: SortArg,
    first: Option<u32>,
    after: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let store = init_store(config)?;

    let parent_id = match parent {
        Some(p) => Some(require_group(&store, &p)?.metadata.id),
        None => None,
    };

    let result = store.get_groups(&GetGroupsInput {
        sort: Some(sort.into()),
        pagination: Some(PaginationOptions { first, after }),
        filter: Some(GroupFilter {
            parent_id,
            search,
            root_only,
            ..Default::default()
        }),
    })?;

    if json {
        let output = GroupListOutput {
            groups: result.groups.iter().map(GroupOutput::from).collect(),
            total_count: result.page_info.total_count,
            has_next_page: result.page_info.has_next_page,
            end_cursor: result.page_info.end_cursor.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if result.groups.is_empty() {
        println!("No groups found.");
        return Ok(());
    }

    for group in &result.groups {
        println!("{}", group.full_path);
    }
    if let Some(cursor) = result.page_info.end_cursor {
        println!();
        println!("More results available. Continue with --after {cursor}");
    }

    Ok(())
}

pub fn run_group_move(
    config: &StoreConfig,
    path: String,
    to: Option<String>,
    non_interactive: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let group = require_group(&store, &path)?;
    let new_parent = to.map(|p| require_group(&store, &p)).transpose()?;

    let destination = match &new_parent {
        Some(parent) => format!("under '{}'", parent.full_path),
        None => "to the top level".to_string(),
    };
    let confirmed = confirm_action(
        &format!("Move group '{}' {destination}?", group.full_path),
        yes,
        non_interactive,
    )?;

    if !confirmed {
        println!("Cancelled.");
        return Ok(());
    }

    let moved = store.migrate_group(&group, new_parent.as_ref())?;

    println!();
    println!("Moved group '{}' to '{}'", group.full_path, moved.full_path);
    println!();

    Ok(())
}

pub fn run_group_depth(config: &StoreConfig, path: String) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let group = require_group(&store, &path)?;
    println!("{}", store.get_child_depth(&group)?);
    Ok(())
}

pub fn run_group_delete(
    config: &StoreConfig,
    path: String,
    non_interactive: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let group = require_group(&store, &path)?;

    let confirmed = confirm_action(
        &format!("Delete group '{}'?", group.full_path),
        yes,
        non_interactive,
    )?;

    if !confirmed {
        println!("Cancelled.");
        return Ok(());
    }

    store.delete_group(&group)?;

    println!();
    println!("Deleted group '{}'", group.full_path);
    println!();

    Ok(())
}
