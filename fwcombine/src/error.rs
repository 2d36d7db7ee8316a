//! Library and application errors

use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::image::Region;

/// All possible errors returned by fwcombine
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Build step '{step}' failed: {reason}")]
    #[diagnostic(
        code(fwcombine::build_failed),
        help("Fix the errors reported by the build tool above and run the command again")
    )]
    BuildFailed { step: String, reason: String },

    #[error("No build tool could be located (tried: {0})")]
    #[diagnostic(
        code(fwcombine::build_tool_not_found),
        help("Install PlatformIO or set `tool` under [build] in fwcombine.toml")
    )]
    BuildToolNotFound(String),

    #[error("Build step '{step}' reported success but produced no binary at {}", .path.display())]
    #[diagnostic(
        code(fwcombine::missing_artifact),
        help("Check `build_dir` and `artifact` under [build] in fwcombine.toml")
    )]
    MissingArtifact { step: String, path: PathBuf },

    #[error("The {region} binary is {size} bytes, which exceeds the {capacity} bytes available")]
    #[diagnostic(
        code(fwcombine::region_overflow),
        help("Reduce the size of the {region} or select a flash layout with a larger {region} region")
    )]
    RegionOverflow {
        region: Region,
        size: usize,
        capacity: usize,
    },

    #[error("Invalid flash layout: {0}")]
    #[diagnostic(code(fwcombine::invalid_layout))]
    InvalidLayout(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(fwcombine::invalid_config))]
    InvalidConfig(String),

    #[error("Misplaced configuration key: {0}")]
    #[diagnostic(
        code(fwcombine::misplaced_key),
        help("Move the keys to the section named in the message")
    )]
    MisplacedKey(String),

    #[error("Failed to open file: {}", .0.display())]
    #[diagnostic(code(fwcombine::file_open))]
    FileOpenError(PathBuf, #[source] io::Error),

    #[error("Failed to write output: {}", .0.display())]
    #[diagnostic(
        code(fwcombine::output),
        help("Ensure the output directory is writable")
    )]
    OutputError(PathBuf, #[source] io::Error),

    #[error(transparent)]
    #[diagnostic(code(fwcombine::io))]
    IoError(#[from] io::Error),
}
