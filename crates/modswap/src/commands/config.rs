use crate::errors::CliError;
use crate::utils::config::load_settings;
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use miette::Result;

/// Print a config path entry with status indicator
fn print_path_config(name: &str, path: Option<&Utf8Path>, validator: impl Fn(&Utf8Path) -> bool) {
    match path {
        Some(p) => {
            let status = if validator(p) {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", format!("{}:", name).bright_white(), p, status);
        }
        None => {
            println!(
                "  {} {}",
                format!("{}:", name).bright_white(),
                "(not set)".bright_yellow()
            );
        }
    }
}

pub fn show_config(config: Option<&str>) -> Result<()> {
    let store = load_settings(config)?;
    let settings = store.settings();
    let base_dir = settings.base_dir.clone();

    println!();
    println!("  {} {}", "config_file:".bright_white(), store.path());

    print_path_config("base_dir", settings.base_dir.as_deref(), |p| {
        p.as_std_path().is_dir()
    });
    print_path_config("overlays_dir", settings.overlays_dir.as_deref(), |p| {
        p.as_std_path().is_dir()
    });
    print_path_config("state_dir", Some(store.state_dir().as_path()), |_| true);
    print_path_config("launcher", settings.launcher.as_deref(), |p| {
        base_dir
            .as_ref()
            .is_some_and(|base| base.join(p).as_std_path().is_file())
    });
    println!(
        "  {} {}",
        "active_overlay:".bright_white(),
        settings
            .active_overlay
            .as_deref()
            .unwrap_or("(base)")
            .bright_cyan()
    );

    println!();
    Ok(())
}

pub fn set_base_dir(config: Option<&str>, path: String) -> Result<()> {
    let mut store = load_settings(config)?;
    store.set_base_dir(path.as_str()).map_err(CliError::from)?;

    print_updated("Base directory", &path);
    Ok(())
}

pub fn set_overlays_dir(config: Option<&str>, path: String) -> Result<()> {
    let mut store = load_settings(config)?;
    store.set_overlays_dir(path.as_str()).map_err(CliError::from)?;

    print_updated("Overlays directory", &path);
    Ok(())
}

pub fn set_launcher(config: Option<&str>, path: Option<String>) -> Result<()> {
    let mut store = load_settings(config)?;
    store
        .set_launcher(path.as_deref().map(Utf8PathBuf::from))
        .map_err(CliError::from)?;

    match path {
        Some(path) => print_updated("Launcher", &path),
        None => println!("{}", "✓ Launcher cleared".bright_green().bold()),
    }
    Ok(())
}

pub fn reset_config(config: Option<&str>) -> Result<()> {
    let mut store = load_settings(config)?;
    store.reset().map_err(CliError::from)?;

    println!(
        "{}",
        "✓ Configuration reset to defaults".bright_green().bold()
    );
    println!();
    println!("  {} {}", "Config file:".bright_white().bold(), store.path());
    println!();
    println!(
        "  {}",
        "Run 'modswap config set-base-dir <path>' to point modswap at your game".bright_cyan()
    );

    Ok(())
}

fn print_updated(what: &str, value: &str) {
    println!(
        "{}",
        format!("✓ {} set successfully!", what).bright_green().bold()
    );
    println!();
    println!("  {} {}", "Path:".bright_white().bold(), value.bright_green());
}
