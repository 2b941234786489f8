use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use bodyshop::cli::{Cli, Commands, GlobalOpts};

fn init_tracing(global: &GlobalOpts) {
    let default_level = if global.debug {
        "debug"
    } else if global.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bodyshop={}", default_level)));

    // A second init (tests embedding main) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_tracing(&cli.global);
    let global = &cli.global;

    match cli.command {
        Commands::Init(args) => bodyshop::cli::commands::init::run(args, global),
        Commands::Opp(cmd) => bodyshop::cli::commands::opp::run(cmd, global),
        Commands::Wf(cmd) => bodyshop::cli::commands::wf::run(cmd, global),
        Commands::Task(cmd) => bodyshop::cli::commands::task::run(cmd, global),
        Commands::Tech(cmd) => bodyshop::cli::commands::tech::run(cmd, global),
        Commands::Metrics(cmd) => bodyshop::cli::commands::metrics::run(cmd, global),
        Commands::Completions(args) => bodyshop::cli::commands::completions::run(args),
    }
}
