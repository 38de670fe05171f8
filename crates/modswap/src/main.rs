use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    activate_overlay, deactivate_overlay, delete_overlay, import_overlay, launch, list_overlays,
    repair, reset_config, set_base_dir, set_launcher, set_overlays_dir, show_config, show_status,
    ActivateArgs, DeleteArgs, ImportArgs,
};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (defaults to config.toml next to the executable)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available overlays
    List,
    /// Show the game directory state
    Status,
    /// Apply an overlay, reverting the active one first
    Activate {
        /// Name of the overlay
        name: String,

        /// Start the launcher after activation
        #[arg(long)]
        launch: bool,
    },
    /// Restore the game directory to its original state
    Deactivate,
    /// Start the configured launcher
    Launch,
    /// Import an overlay from a .zip, .7z or .rar archive
    Import {
        /// The path to the archive
        archive: String,

        /// Activate the overlay after importing it
        #[arg(long)]
        activate: bool,
    },
    /// Delete an overlay, reverting it first if it is active
    Delete {
        /// Name of the overlay
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Revert changes left behind by interrupted operations
    Repair,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Set the game directory overlays are applied to
    SetBaseDir { path: String },
    /// Set the directory containing the overlays
    SetOverlaysDir { path: String },
    /// Set the launcher executable, relative to the game directory (omit to clear)
    SetLauncher { path: Option<String> },
    /// Reset the configuration to defaults
    Reset,
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).expect("failed to parse arguments")
}

fn main() -> Result<()> {
    let args = parse_args();
    utils::logging::init_logging(args.verbose);

    let config = args.config.as_deref();
    match args.command {
        Commands::List => list_overlays(config),
        Commands::Status => show_status(config),
        Commands::Activate { name, launch } => {
            activate_overlay(config, ActivateArgs { name, launch })
        }
        Commands::Deactivate => deactivate_overlay(config),
        Commands::Launch => launch(config),
        Commands::Import { archive, activate } => {
            import_overlay(config, ImportArgs { archive, activate })
        }
        Commands::Delete { name, yes } => delete_overlay(config, DeleteArgs { name, yes }),
        Commands::Repair => repair(config),
        Commands::Config { command } => match command {
            ConfigCommands::Show => show_config(config),
            ConfigCommands::SetBaseDir { path } => set_base_dir(config, path),
            ConfigCommands::SetOverlaysDir { path } => set_overlays_dir(config, path),
            ConfigCommands::SetLauncher { path } => set_launcher(config, path),
            ConfigCommands::Reset => reset_config(config),
        },
    }
}
