//! Build, assemble and write a combined image
//!
//! [Combiner::run] is the whole pipeline: it refuses to do anything unless it
//! was invoked for the combined target, clears the output directory, builds
//! both sub-projects, and writes the assembled image. Every failure aborts the
//! run before the image is written.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    builder::{BuildSettings, Builder},
    error::Error,
    image::{FirmwareImage, ImageSummary},
    layout::FlashLayout,
    output::{check_output_dir, write_image, OutputSettings},
};

/// The build configuration producing a combined image, and the steps it
/// depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedTarget {
    pub name: String,
    pub bootloader: String,
    pub application: String,
}

impl CombinedTarget {
    pub fn new(name: impl Into<String>, build: &BuildSettings) -> Self {
        Self {
            name: name.into(),
            bootloader: build.bootloader.clone(),
            application: build.application.clone(),
        }
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Invoked for a configuration other than the combined target
    Skipped { env: String },
    /// The image was written to `path`
    Written { path: PathBuf, summary: ImageSummary },
}

/// Assembles images for one flash layout into one output location
#[derive(Debug, Clone)]
pub struct Combiner {
    layout: FlashLayout,
    output: OutputSettings,
}

impl Combiner {
    /// Create a combiner writing to `output`.
    ///
    /// Fails if `output` is cleared on every run and would contain
    /// `project_dir` or the current directory.
    pub fn new(
        layout: FlashLayout,
        output: OutputSettings,
        project_dir: &Path,
    ) -> Result<Self, Error> {
        layout.validate()?;
        if output.file.is_empty() {
            return Err(Error::InvalidConfig(
                "the output file name must not be empty".into(),
            ));
        }
        if output.clean {
            let cwd = env::current_dir()?;
            check_output_dir(&output.dir, &[cwd.as_path(), project_dir])?;
        }

        Ok(Self { layout, output })
    }

    pub fn layout(&self) -> &FlashLayout {
        &self.layout
    }

    pub fn image_path(&self) -> PathBuf {
        self.output.image_path()
    }

    /// Build both sub-projects and combine their binaries.
    ///
    /// Does nothing unless `env` names the combined target.
    pub fn run<B: Builder>(
        &self,
        builder: &mut B,
        env: &str,
        target: &CombinedTarget,
    ) -> Result<Outcome, Error> {
        if env != target.name {
            debug!("Skipping, '{env}' is not the combined target '{}'", target.name);
            return Ok(Outcome::Skipped { env: env.into() });
        }

        self.output.prepare()?;

        info!("[1/3] Building bootloader ({})", target.bootloader);
        let bootloader = builder.build(&target.bootloader)?;
        info!("[2/3] Building application ({})", target.application);
        let application = builder.build(&target.application)?;

        ensure_artifact(&target.bootloader, &bootloader)?;
        ensure_artifact(&target.application, &application)?;

        info!("[3/3] Combining binaries");
        let bootloader = read_binary(&bootloader)?;
        let application = read_binary(&application)?;

        self.write(&bootloader, &application)
    }

    /// Combine two already built binaries.
    pub fn assemble_files(&self, bootloader: &Path, application: &Path) -> Result<Outcome, Error> {
        let bootloader = read_binary(bootloader)?;
        let application = read_binary(application)?;

        self.output.prepare()?;

        self.write(&bootloader, &application)
    }

    fn write(&self, bootloader: &[u8], application: &[u8]) -> Result<Outcome, Error> {
        let image = FirmwareImage::assemble(&self.layout, bootloader, application)?;

        let path = self.output.image_path();
        info!("Writing combined binary: {}", path.display());
        write_image(&path, image.data())?;

        Ok(Outcome::Written {
            path,
            summary: image.summary(),
        })
    }
}

fn ensure_artifact(step: &str, path: &Path) -> Result<(), Error> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingArtifact {
            step: step.to_string(),
            path: path.to_path_buf(),
        })
    }
}

fn read_binary(path: &Path) -> Result<Vec<u8>, Error> {
    info!("Reading {}", path.display());
    let data = fs::read(path).map_err(|e| Error::FileOpenError(path.to_path_buf(), e))?;
    info!("Size: {} bytes", data.len());

    Ok(data)
}
