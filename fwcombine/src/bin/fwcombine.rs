use clap::{Parser, Subcommand};
use fwcombine::{
    cli::{self, config::Config, AssembleArgs, BuildArgs},
    logging::initialize_logger,
};
use log::{debug, LevelFilter};
use miette::Result;

#[derive(Debug, Parser)]
#[clap(about, propagate_version = true, version)]
struct Cli {
    /// Print debug output
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the bootloader and the application, then combine them into one
    /// image
    ///
    /// Only runs when invoked for the combined target (`--env` or the
    /// `PIOENV` environment variable), any other build configuration is
    /// skipped.
    Build(BuildArgs),
    /// Combine an already built bootloader and application into one image
    Assemble(AssembleArgs),
    /// List the built-in flash layouts
    Layouts,
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    // Attempt to parse any provided command-line arguments, or print the help
    // message and terminate if the invocation is not correct.
    let args = Cli::parse();
    initialize_logger(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    debug!("{:#?}", args.subcommand);

    // Load any user configuration, if present.
    let config = Config::load()?;

    match args.subcommand {
        Commands::Build(args) => cli::build(args, &config),
        Commands::Assemble(args) => cli::assemble(args, &config),
        Commands::Layouts => cli::layouts(),
    }
}
