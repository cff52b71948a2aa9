use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use canopy::cli::{
    GroupCommands, WorkspaceCommands, resolve_config, run_group_create, run_group_delete,
    run_group_depth, run_group_get, run_group_list, run_group_move, run_init,
    run_workspace_create, run_workspace_delete,
};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Administer a hierarchy of groups and workspaces", long_about = None)]
struct Cli {
    /// Data directory holding the database (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and database
    Init,

    /// Group management
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },

    /// Workspace management
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("canopy=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Init => run_init(&config)?,
        Commands::Group { command } => match command {
            GroupCommands::Create {
                path,
                description,
                created_by,
            } => run_group_create(&config, path, description, created_by)?,
            GroupCommands::Get { path, json } => run_group_get(&config, path, json)?,
            GroupCommands::List {
                parent,
                search,
                root_only,
                sort,
                first,
                after,
                json,
            } => run_group_list(&config, parent, search, root_only, sort, first, after, json)?,
            GroupCommands::Move {
                path,
                to,
                non_interactive,
                yes,
            } => run_group_move(&config, path, to, non_interactive, yes)?,
            GroupCommands::Depth { path } => run_group_depth(&config, path)?,
            GroupCommands::Delete {
                path,
                non_interactive,
                yes,
            } => run_group_delete(&config, path, non_interactive, yes)?,
        },
        Commands::Workspace { command } => match command {
            WorkspaceCommands::Create {
                path,
                description,
                created_by,
            } => run_workspace_create(&config, path, description, created_by)?,
            WorkspaceCommands::Delete {
                path,
                non_interactive,
                yes,
            } => run_workspace_delete(&config, path, non_interactive, yes)?,
        },
    }

    Ok(())
}
