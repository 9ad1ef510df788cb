use anyhow::Result;
use clap::{ArgMatches, Command};
use folio_core::build_site;
use log::info;

use super::add_build_args;
use crate::config::FolioConfig;

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the static site from Markdown content")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = FolioConfig::load(args)?;
    let build_config = config.build_config();

    let report = build_site(
        &config.site,
        &build_config.content_dir(),
        &build_config.output_dir(),
        &build_config.theme_dir(),
        &build_config.static_path(),
    )?;

    info!(
        "Site built successfully in {} ({} pages)",
        build_config.output,
        report.pages
    );

    Ok(())
}
