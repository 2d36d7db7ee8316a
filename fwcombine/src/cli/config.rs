//! Command-line interface configuration
//!
//! The [Config] type handles loading `fwcombine.toml`, which is looked up in
//! the current directory, its parent, and finally the user configuration
//! directory. A missing file yields the defaults of a PlatformIO project with
//! `bootloader_stm32f0`, `application_stm32f0` and `combined_stm32f0`
//! environments.

use std::{
    env,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::debug;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::{
    builder::BuildSettings,
    layout::{FlashLayout, LayoutVersion},
    output::OutputSettings,
    Error,
};

pub const CONFIG_FILE: &str = "fwcombine.toml";

/// Layout selected by the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LayoutConfig {
    /// One of the built-in layouts, e.g. `layout = "v2"`
    Version(LayoutVersion),
    /// A `[layout]` table describing the geometry
    Custom(FlashLayout),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::Version(LayoutVersion::default())
    }
}

impl LayoutConfig {
    pub fn layout(&self) -> FlashLayout {
        match self {
            LayoutConfig::Version(version) => version.layout(),
            LayoutConfig::Custom(layout) => *layout,
        }
    }
}

/// Project configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Name of the build configuration producing the combined image
    pub target: String,
    /// Flash layout
    pub layout: LayoutConfig,
    /// Sub-project builds
    pub build: BuildSettings,
    /// Output location
    pub output: OutputSettings,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: "combined_stm32f0".into(),
            layout: LayoutConfig::default(),
            build: BuildSettings::default(),
            output: OutputSettings::default(),
            project_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from the configuration file, if present.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir()
            .into_diagnostic()
            .wrap_err("Failed to determine the current directory")?;
        let path = Self::find_config_path(&cwd);

        match path {
            Some(path) => {
                // a global configuration still applies to the current project
                let project_dir = match path.parent() {
                    Some(dir) if dir == cwd || cwd.parent() == Some(dir) => dir.to_path_buf(),
                    _ => cwd,
                };
                Self::load_from(&path, project_dir)
            }
            None => {
                debug!("No {CONFIG_FILE} found, using defaults");
                Ok(Config {
                    project_dir: cwd,
                    ..Default::default()
                })
            }
        }
    }

    /// Load configuration from `path`, resolving relative paths against
    /// `project_dir`.
    pub fn load_from(path: &Path, project_dir: PathBuf) -> Result<Self> {
        let raw_data = read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;

        let mut config = Self::parse(&raw_data)
            .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;
        config.project_dir = project_dir;
        debug!("Config: {:#?}", &config);

        Ok(config)
    }

    /// Parse the contents of a configuration file
    pub fn parse(raw_data: &str) -> Result<Self> {
        let toml_value = toml::from_str::<toml::Value>(raw_data)
            .map_err(|e| Error::InvalidConfig(e.message().to_string()))?;

        if let toml::Value::Table(top_level) = &toml_value {
            Self::validate_keys(top_level)?;
        }

        let config: Config =
            toml::from_str(raw_data).map_err(|e| Error::InvalidConfig(e.message().to_string()))?;
        config.layout().validate()?;

        Ok(config)
    }

    pub fn layout(&self) -> FlashLayout {
        self.layout.layout()
    }

    /// Output settings with the directory resolved against the project
    pub fn output(&self) -> OutputSettings {
        OutputSettings {
            dir: self.project_dir.join(&self.output.dir),
            ..self.output.clone()
        }
    }

    fn validate_keys(top_level: &toml::map::Map<String, toml::Value>) -> Result<()> {
        let sections: &[(&str, &[&str])] = &[
            (
                "build",
                &[
                    "tool",
                    "args",
                    "bootloader",
                    "application",
                    "build_dir",
                    "artifact",
                ],
            ),
            ("output", &["dir", "file", "clean"]),
            (
                "layout",
                &[
                    "flash_origin",
                    "flash_size",
                    "bootloader_region_size",
                    "footer",
                    "erase_value",
                ],
            ),
        ];

        let mut misplaced_keys = Vec::new();

        for (section, keys) in sections {
            for &key in *keys {
                if top_level.contains_key(key) {
                    misplaced_keys.push((key, *section));
                }
                for (section_name, value) in top_level {
                    if let toml::Value::Table(table) = value {
                        if table.contains_key(key) && section_name != section {
                            misplaced_keys.push((key, *section));
                        }
                    }
                }
            }
        }

        if misplaced_keys.is_empty() {
            Ok(())
        } else {
            let msg = misplaced_keys
                .into_iter()
                .map(|(key, section)| format!("'{key}' should be under [{section}]!"))
                .collect::<Vec<_>>()
                .join(", ");
            Err(Error::MisplacedKey(msg).into())
        }
    }

    fn find_config_path(cwd: &Path) -> Option<PathBuf> {
        let local_config = cwd.join(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }
        if let Some(parent_folder) = cwd.parent() {
            let workspace_config = parent_folder.join(CONFIG_FILE);
            if workspace_config.exists() {
                return Some(workspace_config);
            }
        }

        let global_config = ProjectDirs::from("rs", "fwcombine", "fwcombine")?
            .config_dir()
            .join(CONFIG_FILE);
        global_config.exists().then_some(global_config)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout::Footer;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.layout(), LayoutVersion::V2.layout());
    }

    #[test]
    fn test_layout_version() {
        let config = Config::parse(r#"layout = "v1""#).unwrap();

        assert_eq!(config.layout, LayoutConfig::Version(LayoutVersion::V1));
        assert_eq!(config.layout().footer, Footer::None);
    }

    #[test]
    fn test_custom_layout() {
        let config = Config::parse(
            r#"
            target = "combined"

            [layout]
            flash_size = 0x20000
            bootloader_region_size = 0x8000
            footer = "none"
            "#,
        )
        .unwrap();

        let layout = config.layout();
        assert_eq!(config.target, "combined");
        assert_eq!(layout.app_region_size(), 0x18000);
        assert_eq!(layout.app_image_capacity(), 0x18000);
    }

    #[test]
    fn test_invalid_custom_layout() {
        let result = Config::parse(
            r#"
            [layout]
            flash_size = 0x4000
            bootloader_region_size = 0x4000
            "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_build_and_output_sections() {
        let config = Config::parse(
            r#"
            [build]
            tool = ["make"]
            args = ["{env}"]
            bootloader = "boot"
            application = "app"
            build_dir = "build"
            artifact = "out.bin"

            [output]
            dir = "dist"
            file = "combined.bin"
            "#,
        )
        .unwrap();

        assert_eq!(config.build.tool, Some(vec!["make".to_string()]));
        assert_eq!(config.build.bootloader, "boot");
        assert_eq!(config.output.file, "combined.bin");
        assert!(config.output.clean);
        assert!(!Config::parse("[output]\nclean = false").unwrap().output.clean);
        // fields not listed keep their defaults
        assert_eq!(
            Config::parse("[build]\nbootloader = \"boot\"")
                .unwrap()
                .build
                .artifact,
            "firmware.bin"
        );
    }

    #[test]
    fn test_output_resolves_against_project_dir() {
        let config = Config {
            project_dir: PathBuf::from("/project"),
            ..Default::default()
        };

        assert_eq!(
            config.output().image_path(),
            PathBuf::from("/project/.pio/build/combined_stm32f0/firmware.bin")
        );
    }

    #[test]
    fn test_misplaced_keys() {
        let err = Config::parse(r#"bootloader = "boot""#).unwrap_err();
        assert!(err.to_string().contains("Misplaced"));

        let err = Config::parse("[output]\nbootloader = \"boot\"").unwrap_err();
        assert!(err.to_string().contains("Misplaced"));
    }

    #[test]
    fn test_unknown_key() {
        assert!(Config::parse("[build]\ncompiler = \"gcc\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "target = \"all\"\n").unwrap();

        let config = Config::load_from(&path, dir.path().to_path_buf()).unwrap();

        assert_eq!(config.target, "all");
        assert_eq!(config.project_dir, dir.path());
    }
}
