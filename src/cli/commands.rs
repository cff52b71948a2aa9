use clap::{Subcommand, ValueEnum};

use crate::store::GroupSortableField;

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a group; its parent is taken from the path
    Create {
        /// Full path of the new group (e.g. "platform/network")
        path: String,

        /// Group description
        #[arg(long, default_value = "")]
        description: String,

        /// Recorded as the group's creator
        #[arg(long, default_value = "admin")]
        created_by: String,
    },

    /// Show a group
    Get {
        /// Full path of the group
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List groups
    List {
        /// Only list direct children of this group
        #[arg(long)]
        parent: Option<String>,

        /// Substring to match against full paths
        #[arg(long)]
        search: Option<String>,

        /// Only list top-level groups
        #[arg(long)]
        root_only: bool,

        /// Sort order
        #[arg(long, value_enum, default_value_t = SortArg::FullPathAsc)]
        sort: SortArg,

        /// Page size
        #[arg(long)]
        first: Option<u32>,

        /// Cursor returned by a previous page
        #[arg(long)]
        after: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move a group and everything under it
    Move {
        /// Full path of the group to move
        path: String,

        /// Full path of the new parent (omit to make the group top-level)
        #[arg(long)]
        to: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Print how many levels of groups sit below a group
    Depth {
        /// Full path of the group
        path: String,
    },

    /// Delete an empty group
    Delete {
        /// Full path of the group
        path: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Create a workspace; its group is taken from the path
    Create {
        /// Full path of the new workspace (e.g. "platform/prod")
        path: String,

        /// Workspace description
        #[arg(long, default_value = "")]
        description: String,

        /// Recorded as the workspace's creator
        #[arg(long, default_value = "admin")]
        created_by: String,
    },

    /// Delete a workspace
    Delete {
        /// Full path of the workspace
        path: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    FullPathAsc,
    FullPathDesc,
    LevelAsc,
    LevelDesc,
    UpdatedAtAsc,
    UpdatedAtDesc,
}

impl From<SortArg> for GroupSortableField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::FullPathAsc => GroupSortableField::FullPathAsc,
            SortArg::FullPathDesc => GroupSortableField::FullPathDesc,
            SortArg::LevelAsc => GroupSortableField::GroupLevelAsc,
            SortArg::LevelDesc => GroupSortableField::GroupLevelDesc,
            SortArg::UpdatedAtAsc => GroupSortableField::UpdatedAtAsc,
            SortArg::UpdatedAtDesc => GroupSortableField::UpdatedAtDesc,
        }
    }
}
