mod settings;

pub use settings::{
    save_tool_path, save_tool_path_to, Config, ManifestConfig, SnapshotConfig, TomlConfig,
    DEFAULT_OUTPUT_DIR, EXAMPLE_CONFIG, PROJECT_CONFIG_FILE,
};
