use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::open_manager;
use crate::utils::{active_marker, plural};
use colored::Colorize;
use inquire::Confirm;
use miette::{IntoDiagnostic, Result};
use modswap_lib::{LaunchOutcome, ModManager};
use modswap_overlay::{OverlayStage, RevertReport};

/// Name shown for the unmodified game directory.
const BASE_ENTRY: &str = "base";

pub struct ActivateArgs {
    pub name: String,
    pub launch: bool,
}

pub struct DeleteArgs {
    pub name: String,
    pub yes: bool,
}

fn open_with_progress(config: Option<&str>) -> Result<ModManager> {
    let manager = open_manager(config)?.with_progress(|progress| match progress.stage {
        OverlayStage::Applying | OverlayStage::Reverting => {
            if let Some(file) = &progress.current_file {
                tracing::debug!(
                    "[{:?}] {}/{} {}",
                    progress.stage,
                    progress.current,
                    progress.total,
                    file
                );
            }
        }
        OverlayStage::Complete => {}
    });
    Ok(manager)
}

pub fn list_overlays(config: Option<&str>) -> Result<()> {
    let manager = open_manager(config)?;
    let overlays = manager.overlays().map_err(CliError::from)?;
    let base_active = overlays.iter().all(|o| !o.active);

    println_pad!("{}", "📂 Overlays:".bright_blue().bold());
    println_pad!(
        "   {} {}",
        active_marker(base_active),
        BASE_ENTRY.bright_white().bold()
    );
    for overlay in &overlays {
        let name = if overlay.active {
            overlay.name.bright_green().bold()
        } else {
            overlay.name.normal()
        };
        println_pad!("   {} {}", active_marker(overlay.active), name);
    }

    if overlays.is_empty() {
        println_pad!(
            "\n{}",
            "No overlays found. Use 'modswap import <archive>' to add one.".bright_yellow()
        );
    }
    Ok(())
}

pub fn show_status(config: Option<&str>) -> Result<()> {
    let manager = open_manager(config)?;
    let status = manager.status().map_err(CliError::from)?;

    println_pad!("{} {}", "🎮 Game directory:".bright_blue(), status.base_dir);
    println_pad!("{} {}", "📂 Overlays:".bright_blue(), status.overlays_dir);
    println_pad!("{} {}", "🗂️  State:".bright_blue(), status.state_dir);

    match &status.active {
        Some(active) => {
            println_pad!(
                "{} {}",
                "✨ Active overlay:".bright_green(),
                active.bright_cyan().bold()
            );
            println_pad!(
                "   {} added, {} replaced",
                plural(status.added, "file"),
                plural(status.overwritten, "file")
            );
        }
        None => println_pad!(
            "{} {}",
            "✨ Active overlay:".bright_green(),
            "none (base)".dimmed()
        ),
    }

    if !status.stray_manifests.is_empty() {
        println_pad!(
            "\n{} {}",
            "⚠️  Leftover changes from:".bright_yellow().bold(),
            status.stray_manifests.join(", ").bright_yellow()
        );
        println_pad!("   {}", "Run 'modswap repair' to revert them.".bright_yellow());
    }
    Ok(())
}

pub fn activate_overlay(config: Option<&str>, args: ActivateArgs) -> Result<()> {
    let manager = open_with_progress(config)?;

    println_pad!(
        "{} {}",
        "🔄 Activating overlay:".bright_blue().bold(),
        args.name.bright_cyan().bold()
    );
    let activation = manager.activate(&args.name).map_err(CliError::from)?;

    if let Some(reverted) = &activation.reverted {
        print_revert_report(reverted);
    }
    println_pad!(
        "{} {} ({} added, {} replaced)",
        "✓ Activated".bright_green().bold(),
        args.name.bright_cyan().bold(),
        plural(activation.manifest.added.len(), "file"),
        plural(activation.manifest.overwritten.len(), "file")
    );

    if args.launch {
        launch_game(&manager)?;
    }
    Ok(())
}

pub fn deactivate_overlay(config: Option<&str>) -> Result<()> {
    let manager = open_with_progress(config)?;

    match manager.deactivate().map_err(CliError::from)? {
        Some(report) => {
            print_revert_report(&report);
            println_pad!(
                "{}",
                "✓ Game directory restored to its original state"
                    .bright_green()
                    .bold()
            );
        }
        None => println_pad!("{}", "No overlay is active; nothing to do.".bright_yellow()),
    }
    Ok(())
}

pub fn delete_overlay(config: Option<&str>, args: DeleteArgs) -> Result<()> {
    let manager = open_with_progress(config)?;

    if !args.yes {
        let confirmed = Confirm::new(&format!("Delete overlay '{}'?", args.name))
            .with_default(false)
            .with_help_message("The overlay directory will be removed permanently")
            .prompt()
            .into_diagnostic()?;
        if !confirmed {
            println_pad!("{}", "Aborted.".bright_yellow());
            return Ok(());
        }
    }

    if let Some(report) = manager.delete(&args.name).map_err(CliError::from)? {
        print_revert_report(&report);
    }
    println_pad!(
        "{} {}",
        "🗑️  Deleted overlay:".bright_green().bold(),
        args.name.bright_cyan()
    );
    Ok(())
}

pub fn repair(config: Option<&str>) -> Result<()> {
    let manager = open_with_progress(config)?;
    let reports = manager.repair().map_err(CliError::from)?;

    if reports.is_empty() {
        println_pad!("{}", "✓ Nothing to repair".bright_green().bold());
        return Ok(());
    }
    for report in &reports {
        print_revert_report(report);
    }
    println_pad!(
        "{} {}",
        "✓ Repaired".bright_green().bold(),
        plural(reports.len(), "overlay")
    );
    Ok(())
}

pub fn launch(config: Option<&str>) -> Result<()> {
    let manager = open_manager(config)?;
    launch_game(&manager)
}

fn launch_game(manager: &ModManager) -> Result<()> {
    match manager.launch().map_err(CliError::from)? {
        LaunchOutcome::Exited(status) if status.success() => {
            println_pad!("{}", "🎮 Game exited".bright_green());
        }
        LaunchOutcome::Exited(status) => {
            println_pad!("{} {}", "🎮 Game exited with".bright_yellow(), status);
        }
        LaunchOutcome::NotConfigured => {
            println_pad!(
                "{}",
                "⚠️  No launcher configured. Use 'modswap config set-launcher <exe>'."
                    .bright_yellow()
            );
        }
        LaunchOutcome::NotFound(path) => {
            println_pad!(
                "{} {}",
                "⚠️  Launcher not found:".bright_yellow(),
                path.as_str().bright_yellow()
            );
        }
    }
    Ok(())
}

fn print_revert_report(report: &RevertReport) {
    println_pad!(
        "{} {} ({} removed, {} restored)",
        "↩️  Reverted".bright_blue(),
        report.overlay.bright_cyan(),
        plural(report.removed, "file"),
        plural(report.restored, "file")
    );
    if !report.missing_backups.is_empty() {
        println_pad!(
            "   {}",
            "⚠️  Backups missing, these files still contain overlay data:".bright_yellow()
        );
        for path in &report.missing_backups {
            println_pad!("     {} {}", "•".bright_yellow(), path);
        }
    }
}
