//! Sub-project builds
//!
//! The combined image needs two binaries which are produced by an external
//! build system. [Builder] abstracts over running one build step and reporting
//! where its binary ended up, so the assembly pipeline can be exercised
//! without a real toolchain.

use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Placeholder replaced by the step name in build arguments
pub const ENV_PLACEHOLDER: &str = "{env}";

/// Tools tried, in order, when none is configured
const DEFAULT_TOOLS: &[&[&str]] = &[
    &["platformio"],
    &["pio"],
    &["python3", "-m", "platformio"],
    &["python", "-m", "platformio"],
];

/// Runs a single build step and returns the path of the binary it produced
pub trait Builder {
    fn build(&mut self, step: &str) -> Result<PathBuf, Error>;
}

/// How the sub-projects are built and where their binaries are found
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// Build tool and leading arguments, detected when absent
    pub tool: Option<Vec<String>>,
    /// Arguments passed after the tool, `{env}` is replaced by the step name
    pub args: Vec<String>,
    /// Step producing the bootloader
    pub bootloader: String,
    /// Step producing the application
    pub application: String,
    /// Directory containing one output directory per step
    pub build_dir: PathBuf,
    /// File name of the binary inside a step's output directory
    pub artifact: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            tool: None,
            args: vec!["run".into(), "-e".into(), ENV_PLACEHOLDER.into()],
            bootloader: "bootloader_stm32f0".into(),
            application: "application_stm32f0".into(),
            build_dir: PathBuf::from(".pio/build"),
            artifact: "firmware.bin".into(),
        }
    }
}

impl BuildSettings {
    /// Where the binary of `step` is expected after a successful build
    pub fn artifact_path(&self, project_dir: &Path, step: &str) -> PathBuf {
        project_dir
            .join(&self.build_dir)
            .join(step)
            .join(&self.artifact)
    }

    fn args_for(&self, step: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(ENV_PLACEHOLDER, step))
            .collect()
    }
}

/// [Builder] spawning an external build tool in the project directory
#[derive(Debug)]
pub struct CommandBuilder {
    project_dir: PathBuf,
    settings: BuildSettings,
    resolved_tool: Option<Vec<String>>,
}

impl CommandBuilder {
    pub fn new(project_dir: impl Into<PathBuf>, settings: BuildSettings) -> Self {
        let resolved_tool = settings.tool.clone();

        Self {
            project_dir: project_dir.into(),
            settings,
            resolved_tool,
        }
    }

    fn run_tool(&self, tool: &[String], step: &str) -> io::Result<ExitStatus> {
        let (program, leading_args) = tool
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty build tool"))?;

        let mut command = Command::new(program);
        command
            .args(leading_args)
            .args(self.settings.args_for(step))
            .current_dir(&self.project_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        debug!("Running command: {command:?}");

        command.status()
    }

    fn candidates(&self) -> Vec<Vec<String>> {
        match &self.resolved_tool {
            Some(tool) => vec![tool.clone()],
            None => DEFAULT_TOOLS
                .iter()
                .map(|tool| tool.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }
}

impl Builder for CommandBuilder {
    fn build(&mut self, step: &str) -> Result<PathBuf, Error> {
        info!("Building {step}...");

        let mut tried = Vec::new();
        for tool in self.candidates() {
            match self.run_tool(&tool, step) {
                Ok(status) if status.success() => {
                    self.resolved_tool = Some(tool);
                    info!("Built {step} successfully");
                    return Ok(self.settings.artifact_path(&self.project_dir, step));
                }
                Ok(status) => {
                    return Err(Error::BuildFailed {
                        step: step.to_string(),
                        reason: status.to_string(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Build tool '{}' not found", tool.join(" "));
                    tried.push(tool.join(" "));
                }
                Err(e) => {
                    return Err(Error::BuildFailed {
                        step: step.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(Error::BuildToolNotFound(tried.join(", ")))
    }
}
