use std::fs;
use std::path::Path;

use serde::Deserialize;
use toml_edit::{DocumentMut, Item, Table};

use crate::repro::manifest::{ManifestOptions, DEFAULT_IGNORED_DIRS, DEFAULT_MAX_FILE_SIZE_BYTES};
use crate::repro::scripts::DEFAULT_SCRIPT_EXTENSIONS;
use crate::util::paths::config_path;
use crate::util::tools::{ExtraTool, Tool, ToolPaths, DEFAULT_PROBE_TIMEOUT_SECS};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Per-project override file, read from the working directory
pub const PROJECT_CONFIG_FILE: &str = "reprokit.toml";

/// Default name of the snapshot directory
pub const DEFAULT_OUTPUT_DIR: &str = "reproducibility";

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub snapshot: SnapshotConfig,
    pub manifest: ManifestConfig,
    /// Configured paths for external tools (git, conda, mf6, ...)
    pub tool_paths: ToolPaths,
    pub extra_tools: Vec<ExtraTool>,
    pub probe_timeout_secs: u64,
    /// User patterns appended to the built-in scrub rules
    pub scrub_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub output_dir: String,
    pub extensions: Vec<String>,
    pub include_builds: bool,
    pub git: bool,
    pub conda: bool,
    pub tools: bool,
    pub manifest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestConfig {
    pub ignore: Vec<String>,
    pub max_file_size_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot: SnapshotConfig {
                output_dir: DEFAULT_OUTPUT_DIR.to_string(),
                extensions: DEFAULT_SCRIPT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
                include_builds: false,
                git: true,
                conda: true,
                tools: true,
                manifest: true,
            },
            manifest: ManifestConfig {
                ignore: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
                max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            },
            tool_paths: ToolPaths::default(),
            extra_tools: Vec::new(),
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            scrub_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlSnapshotConfig {
    pub output_dir: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub include_builds: Option<bool>,
    pub git: Option<bool>,
    pub conda: Option<bool>,
    pub tools: Option<bool>,
    pub manifest: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlManifestConfig {
    pub ignore: Option<Vec<String>>,
    pub max_file_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlToolsConfig {
    #[serde(flatten)]
    pub paths: ToolPaths,
    pub probe_timeout_secs: Option<u64>,
    #[serde(default)]
    pub extra: Vec<ExtraTool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlScrubConfig {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub snapshot: Option<TomlSnapshotConfig>,
    pub manifest: Option<TomlManifestConfig>,
    pub tools: Option<TomlToolsConfig>,
    pub scrub: Option<TomlScrubConfig>,
}

impl Config {
    /// Load the user config file and the project file of `working_dir`,
    /// merged over the defaults
    pub fn load(working_dir: &Path) -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file, working_dir)
    }

    /// Layered load without touching the data directory
    pub fn load_from(user_file: &Path, working_dir: &Path) -> Self {
        let mut config = Config::default();

        for file in [user_file.to_path_buf(), working_dir.join(PROJECT_CONFIG_FILE)] {
            if let Some(toml_config) = read_toml_config(&file) {
                tracing::debug!(path = %file.display(), "Applying config file");
                config.merge(toml_config);
            }
        }

        config
    }

    /// Apply every value set in `toml` on top of `self`
    pub fn merge(&mut self, toml: TomlConfig) {
        if let Some(snapshot) = toml.snapshot {
            if let Some(output_dir) = snapshot.output_dir {
                self.snapshot.output_dir = output_dir;
            }
            if let Some(extensions) = snapshot.extensions {
                self.snapshot.extensions = extensions;
            }
            if let Some(include_builds) = snapshot.include_builds {
                self.snapshot.include_builds = include_builds;
            }
            if let Some(git) = snapshot.git {
                self.snapshot.git = git;
            }
            if let Some(conda) = snapshot.conda {
                self.snapshot.conda = conda;
            }
            if let Some(tools) = snapshot.tools {
                self.snapshot.tools = tools;
            }
            if let Some(manifest) = snapshot.manifest {
                self.snapshot.manifest = manifest;
            }
        }

        if let Some(manifest) = toml.manifest {
            if let Some(ignore) = manifest.ignore {
                self.manifest.ignore = ignore;
            }
            if let Some(max) = manifest.max_file_size_bytes {
                self.manifest.max_file_size_bytes = max;
            }
        }

        if let Some(tools) = toml.tools {
            for &tool in Tool::all() {
                if let Some(path) = tools.paths.get(tool) {
                    self.tool_paths.set(tool, path.clone());
                }
            }
            if let Some(timeout) = tools.probe_timeout_secs {
                self.probe_timeout_secs = timeout;
            }
            for extra in tools.extra {
                // A later file redefines a tool of the same name
                self.extra_tools.retain(|e| e.name != extra.name);
                self.extra_tools.push(extra);
            }
        }

        if let Some(scrub) = toml.scrub {
            self.scrub_patterns.extend(scrub.patterns);
        }
    }

    pub fn manifest_options(&self) -> ManifestOptions {
        ManifestOptions {
            ignore: self.manifest.ignore.clone(),
            exclude: Vec::new(),
            max_file_size_bytes: self.manifest.max_file_size_bytes,
        }
    }

    /// Write the bundled example to `path` unless something is already there.
    ///
    /// Returns whether a file was created.
    pub fn init_config_file(path: &Path) -> std::io::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, EXAMPLE_CONFIG)?;
        Ok(true)
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Err(e) = Self::init_config_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write default config");
        }
    }
}

fn read_toml_config(path: &Path) -> Option<TomlConfig> {
    if !path.is_file() {
        return None;
    }
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read config file");
            return None;
        }
    };
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
            None
        }
    }
}

/// Save a tool path to the user config file
///
/// This function reads the existing config.toml, adds or updates the tool path
/// in the [tools] section, and writes it back while preserving all other content.
pub fn save_tool_path(tool: Tool, path: &Path) -> std::io::Result<()> {
    save_tool_path_to(&config_path(), tool, path)
}

pub fn save_tool_path_to(config_file: &Path, tool: Tool, path: &Path) -> std::io::Result<()> {
    let contents = if config_file.exists() {
        fs::read_to_string(config_file)?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = contents
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if !doc.contains_key("tools") {
        doc["tools"] = Item::Table(Table::new());
    }

    let path_str = path.to_string_lossy().to_string();
    doc["tools"][tool.binary_name()] = toml_edit::value(path_str);

    if let Some(parent) = config_file.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(config_file, doc.to_string())?;

    Ok(())
}
