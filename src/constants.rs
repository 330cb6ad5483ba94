// src/constants.rs

/// The marker file that turns a directory into a context root.
pub const MARKER_FILENAME: &str = ".envrc";

/// Default prefix of exporter-metadata keys (never applied, never rolled back).
pub const DEFAULT_METADATA_PREFIX: &str = "DIRENV_";

/// The exporter executable used when no configuration overrides it.
pub const DEFAULT_EXPORTER: &str = "direnv";

/// Name of the application directory under the system config and cache dirs.
pub const APP_DIR_NAME: &str = "envsync";

/// The name of the settings file (in ~/.config/envsync/).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable that points to an alternative settings file.
pub const CONFIG_PATH_ENV: &str = "ENVSYNC_CONFIG";

/// Extension of every persisted overlay file in the cache root.
pub const CACHE_FILE_EXTENSION: &str = "cache";

/// Default delay between two progress frames, in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 80;

/// Spinner frames shown while an export is in flight.
pub const PROGRESS_FRAMES: [&str; 7] = [
    "\u{2884}", "\u{2882}", "\u{2881}", "\u{2841}", "\u{2848}", "\u{2850}", "\u{2860}",
];

/// Hint appended to the tool-not-found report.
pub const INSTALL_HINT: &str = "follow https://direnv.net for installation instructions";
