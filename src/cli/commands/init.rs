//! `bodyshop init` - create a data directory

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::data_dir;
use crate::cli::GlobalOpts;
use crate::core::YamlSource;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to --data-dir or the current directory)
    pub path: Option<PathBuf>,

    /// Overwrite an existing shop config with the defaults
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => data_dir(global)?,
    };
    let existed = YamlSource::is_initialized(&root);
    let source = YamlSource::init(&root, args.force).into_diagnostic()?;

    if existed && !args.force {
        println!(
            "{} already initialized at {}",
            style("!").yellow(),
            source.root().display()
        );
    } else {
        println!(
            "{} Initialized bodyshop data directory at {}",
            style("✓").green(),
            style(source.root().display()).cyan()
        );
    }
    Ok(())
}
