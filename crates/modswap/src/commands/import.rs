use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::open_manager;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;

pub struct ImportArgs {
    pub archive: String,
    pub activate: bool,
}

pub fn import_overlay(config: Option<&str>, args: ImportArgs) -> Result<()> {
    let manager = open_manager(config)?;
    let archive = Utf8PathBuf::from(&args.archive);

    println_pad!(
        "{} {}",
        "📦 Importing:".bright_blue().bold(),
        archive.as_str().bright_white()
    );
    let name = manager.import(&archive).map_err(CliError::import)?;
    println_pad!(
        "{} {}",
        "✓ Imported overlay:".bright_green().bold(),
        name.bright_cyan().bold()
    );

    if args.activate {
        let activation = manager.activate(&name).map_err(CliError::from)?;
        println_pad!(
            "{} {} ({} files)",
            "✓ Activated".bright_green().bold(),
            name.bright_cyan().bold(),
            activation.manifest.file_count()
        );
    }
    Ok(())
}
