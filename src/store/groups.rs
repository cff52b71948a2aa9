//! Group row scanning, lookups and the filtered / sorted / paginated listing.

use std::collections::HashSet;

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};

use super::pagination::{Cursor, CursorKey, PageInfo, PaginationOptions, paginate};
use super::path;
use super::sqlite::{format_datetime, parse_datetime};
use crate::error::{Error, Result};
use crate::types::{Group, ResourceMetadata, Trn};

const GROUP_SELECT: &str = "SELECT g.id, g.version, g.created_at, g.updated_at, g.name, g.description,
            g.parent_id, g.created_by, g.runner_tags, g.enable_drift_detection,
            g.enable_provider_mirror, n.path
     FROM groups g JOIN namespaces n ON n.group_id = g.id";

const GROUP_FROM: &str = "FROM groups g JOIN namespaces n ON n.group_id = g.id";

const LEVEL_EXPR: &str = "(length(n.path) - length(replace(n.path, '/', '')) + 1)";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    let full_path: String = row.get(11)?;
    let runner_tags = row
        .get::<_, Option<String>>(8)?
        .map(|raw| {
            serde_json::from_str::<Vec<String>>(&raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(Group {
        metadata: ResourceMetadata {
            id: row.get(0)?,
            version: row.get(1)?,
            trn: Trn::group(&full_path).to_string(),
            created_at: parse_datetime(&row.get::<_, String>(2)?),
            updated_at: parse_datetime(&row.get::<_, String>(3)?),
        },
        name: row.get(4)?,
        description: row.get(5)?,
        parent_id: row.get(6)?,
        created_by: row.get(7)?,
        runner_tags,
        enable_drift_detection: row.get(9)?,
        enable_provider_mirror: row.get(10)?,
        full_path,
    })
}

pub(crate) fn encode_runner_tags(tags: Option<&Vec<String>>) -> Result<Option<String>> {
    tags.map(|t| serde_json::to_string(t).map_err(|e| Error::Internal(e.to_string())))
        .transpose()
}

fn get_one(conn: &Connection, filter: &str, value: &str) -> Result<Option<Group>> {
    conn.query_row(
        &format!("{GROUP_SELECT} WHERE {filter} = ?1"),
        params![value],
        group_from_row,
    )
    .optional()
    .map_err(Error::from)
}

pub(crate) fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Group>> {
    get_one(conn, "g.id", id)
}

pub(crate) fn get_by_path(conn: &Connection, full_path: &str) -> Result<Option<Group>> {
    get_one(conn, "n.path", full_path)
}

/// Depth of the tree below `group_id`, not counting the group itself: 0 for
/// a leaf, 1 when it only has direct children, and so on. Walks the tree
/// with an explicit stack, one child listing per visited group.
pub(crate) fn child_depth(conn: &Connection, group_id: &str) -> Result<usize> {
    let mut stmt = conn.prepare_cached("SELECT id FROM groups WHERE parent_id = ?1")?;
    let mut visited = HashSet::new();
    let mut stack = vec![(group_id.to_string(), 0usize)];
    let mut max_depth = 0;

    while let Some((id, depth)) = stack.pop() {
        if !visited.insert(id.clone()) {
            return Err(Error::Internal(format!(
                "group hierarchy contains a cycle at group {id}"
            )));
        }
        max_depth = max_depth.max(depth);

        let children = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        stack.extend(children.into_iter().map(|child| (child, depth + 1)));
    }

    Ok(max_depth)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupSortableField {
    #[default]
    FullPathAsc,
    FullPathDesc,
    GroupLevelAsc,
    GroupLevelDesc,
    UpdatedAtAsc,
    UpdatedAtDesc,
}

impl GroupSortableField {
    fn expr(self) -> &'static str {
        match self {
            Self::FullPathAsc | Self::FullPathDesc => "n.path",
            Self::GroupLevelAsc | Self::GroupLevelDesc => LEVEL_EXPR,
            Self::UpdatedAtAsc | Self::UpdatedAtDesc => "g.updated_at",
        }
    }

    fn descending(self) -> bool {
        matches!(
            self,
            Self::FullPathDesc | Self::GroupLevelDesc | Self::UpdatedAtDesc
        )
    }

    fn cursor_for(self, group: &Group) -> Cursor {
        let key = match self {
            Self::FullPathAsc | Self::FullPathDesc => CursorKey::Text(group.full_path.clone()),
            Self::GroupLevelAsc | Self::GroupLevelDesc => {
                CursorKey::Int(path::level(&group.full_path) as i64)
            }
            Self::UpdatedAtAsc | Self::UpdatedAtDesc => {
                CursorKey::Text(format_datetime(&group.metadata.updated_at))
            }
        };
        Cursor {
            key,
            id: group.metadata.id.clone(),
        }
    }

    fn accepts(self, key: &CursorKey) -> bool {
        match self {
            Self::GroupLevelAsc | Self::GroupLevelDesc => matches!(key, CursorKey::Int(_)),
            _ => matches!(key, CursorKey::Text(_)),
        }
    }
}

/// Narrows a group listing. Every set field must match. An empty ID or path
/// list matches nothing.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub parent_id: Option<String>,
    pub group_ids: Option<Vec<String>>,
    pub namespace_ids: Option<Vec<String>>,
    pub group_paths: Option<Vec<String>>,
    /// Case-insensitive substring match against the full path.
    pub search: Option<String>,
    pub root_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GetGroupsInput {
    pub sort: Option<GroupSortableField>,
    pub pagination: Option<PaginationOptions>,
    pub filter: Option<GroupFilter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupsResult {
    pub groups: Vec<Group>,
    pub page_info: PageInfo,
}

#[derive(Default)]
struct WhereClause {
    conditions: Vec<String>,
    values: Vec<Value>,
}

impl WhereClause {
    fn push(&mut self, condition: impl Into<String>, values: impl IntoIterator<Item = Value>) {
        self.conditions.push(condition.into());
        self.values.extend(values);
    }

    fn push_in(&mut self, column: &str, items: &[String]) {
        if items.is_empty() {
            self.conditions.push("0".to_string());
            return;
        }
        let placeholders = vec!["?"; items.len()].join(", ");
        self.push(
            format!("{column} IN ({placeholders})"),
            items.iter().map(|s| Value::Text(s.clone())),
        );
    }

    fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

fn filter_clause(filter: &GroupFilter) -> WhereClause {
    let mut clause = WhereClause::default();

    if let Some(parent_id) = &filter.parent_id {
        clause.push("g.parent_id = ?", [Value::Text(parent_id.clone())]);
    }
    if let Some(ids) = &filter.group_ids {
        clause.push_in("g.id", ids);
    }
    if let Some(ids) = &filter.namespace_ids {
        clause.push_in("n.id", ids);
    }
    if let Some(paths) = &filter.group_paths {
        clause.push_in("n.path", paths);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        clause.push(
            "n.path LIKE ? ESCAPE '\\'",
            [Value::Text(format!("%{}%", path::escape_like(search)))],
        );
    }
    if filter.root_only {
        clause.push("g.parent_id IS NULL", std::iter::empty::<Value>());
    }

    clause
}

pub(crate) fn list(conn: &Connection, input: &GetGroupsInput) -> Result<GroupsResult> {
    let sort = input.sort.unwrap_or_default();
    let default_filter = GroupFilter::default();
    let filter = input.filter.as_ref().unwrap_or(&default_filter);
    let pagination = input.pagination.clone().unwrap_or_default();
    if pagination.first == Some(0) {
        return Err(Error::invalid("page size must be at least 1"));
    }

    let mut clause = filter_clause(filter);

    let total_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {GROUP_FROM}{}", clause.sql()),
        params_from_iter(clause.values.iter()),
        |row| row.get(0),
    )?;

    let direction = if sort.descending() { "DESC" } else { "ASC" };
    let comparison = if sort.descending() { "<" } else { ">" };

    if let Some(after) = &pagination.after {
        let cursor = Cursor::decode(after)?;
        if !sort.accepts(&cursor.key) {
            return Err(Error::invalid("pagination cursor does not match the sort order"));
        }
        clause.push(
            format!("({}, g.id) {comparison} (?, ?)", sort.expr()),
            [cursor.key.to_sql(), Value::Text(cursor.id)],
        );
    }

    let mut sql = format!(
        "{GROUP_SELECT}{} ORDER BY {} {direction}, g.id {direction}",
        clause.sql(),
        sort.expr()
    );
    let limit = pagination.first.map(|n| n as usize);
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        clause.values.push(Value::Integer(limit as i64 + 1));
    }

    let mut stmt = conn.prepare(&sql)?;
    let groups = stmt
        .query_map(params_from_iter(clause.values.iter()), group_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let (groups, end_cursor, has_next_page) = paginate(groups, limit, |g| sort.cursor_for(g))?;

    Ok(GroupsResult {
        groups,
        page_info: PageInfo {
            end_cursor,
            has_next_page,
            total_count,
        },
    })
}
