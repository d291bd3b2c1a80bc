use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use floor::cli::commands;
use floor::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
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
    let global = cli.global;

    init_tracing(global.verbose);

    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Notify(cmd) => commands::notify::run(cmd, &global),
        Commands::Activity(cmd) => commands::activity::run(cmd, &global),
        Commands::Export(args) => commands::export::run(args, &global),
        Commands::Employee(cmd) => commands::employee::run(cmd, &global),
        Commands::Job(cmd) => commands::job::run(cmd, &global),
        Commands::Leave(cmd) => commands::leave::run(cmd, &global),
        Commands::Team(cmd) => cmd.run(&global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}

/// Diagnostics go to stderr; `FLOOR_LOG` overrides the level
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "floor=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("FLOOR_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
