//! Types and functions for the command-line interface
//!
//! No stability guaranties apply

use std::path::PathBuf;

use clap::Args;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use log::debug;
use miette::Result;
use strum::IntoEnumIterator;

use self::config::Config;
use crate::{
    builder::CommandBuilder,
    combine::{CombinedTarget, Combiner, Outcome},
    image::ImageSummary,
    layout::LayoutVersion,
    output::OutputSettings,
};

pub mod config;

/// Layout and output options shared by the commands producing an image
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct ImageArgs {
    /// Flash layout to assemble for, overrides the configuration file
    #[clap(short, long, value_enum)]
    pub layout: Option<LayoutVersion>,
    /// Path to write the combined image to, overrides the configuration file
    ///
    /// Relative paths are resolved against the project directory. Only this
    /// file is replaced, the rest of its directory is left alone.
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

/// Build the bootloader and application, then combine them
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct BuildArgs {
    /// Build configuration being run; only the combined target produces an
    /// image
    #[clap(short, long, env = "PIOENV")]
    pub env: Option<String>,
    #[clap(flatten)]
    pub image_args: ImageArgs,
}

/// Combine an already built bootloader and application
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct AssembleArgs {
    /// Bootloader binary
    pub bootloader: PathBuf,
    /// Application binary
    pub application: PathBuf,
    #[clap(flatten)]
    pub image_args: ImageArgs,
}

/// Run the build pipeline for the configured project
pub fn build(args: BuildArgs, config: &Config) -> Result<()> {
    let combiner = combiner(&args.image_args, config)?;
    let target = CombinedTarget::new(&config.target, &config.build);
    let env = args.env.unwrap_or_else(|| config.target.clone());
    debug!("Running for '{env}', combined target is '{}'", target.name);

    let mut builder = CommandBuilder::new(&config.project_dir, config.build.clone());
    let outcome = combiner.run(&mut builder, &env, &target)?;
    report(&outcome);

    Ok(())
}

/// Combine two binaries given on the command line
pub fn assemble(args: AssembleArgs, config: &Config) -> Result<()> {
    let combiner = combiner(&args.image_args, config)?;

    let outcome = combiner.assemble_files(&args.bootloader, &args.application)?;
    report(&outcome);

    Ok(())
}

/// Print the geometry of every built-in layout
pub fn layouts() -> Result<()> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Layout",
            "Bootloader",
            "Application",
            "Footer",
            "App start",
            "Image size",
        ]);

    for version in LayoutVersion::iter() {
        let layout = version.layout();
        table.add_row(vec![
            version.to_string(),
            format_size(layout.bootloader_region_size as usize),
            format_size(layout.app_region_size() as usize),
            layout.footer.to_string(),
            format!("{:#010x}", layout.app_start_address()),
            format_size(layout.image_size() as usize),
        ]);
    }

    println!("{table}");

    Ok(())
}

fn combiner(args: &ImageArgs, config: &Config) -> Result<Combiner> {
    let layout = match args.layout {
        Some(version) => version.layout(),
        None => config.layout(),
    };
    let output = match &args.output {
        Some(path) => OutputSettings::from_path(&config.project_dir.join(path)),
        None => config.output(),
    };
    debug!("Layout: {layout:#?}");

    Ok(Combiner::new(layout, output, &config.project_dir)?)
}

fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Skipped { .. } => {}
        Outcome::Written { path, summary } => {
            println!("\nCombined binary created successfully!");
            println!("  Output:      {}", path.display());
            print_summary(summary);
        }
    }
}

fn print_summary(summary: &ImageSummary) {
    println!("  Bootloader:  {}", summary.bootloader);
    println!(
        "  Application: {} at {:#010x}",
        summary.application, summary.app_start_address
    );
    if let Some(crc) = summary.crc {
        println!("  CRC32:       {crc:#010x}");
    }
    println!("  Total size:  {}", format_size(summary.total_size));
}

fn format_size(bytes: usize) -> String {
    format!("{bytes} bytes ({:.2} KB)", bytes as f64 / 1024.0)
}
