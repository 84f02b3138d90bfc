#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the Botvy plugin host.
//!
//! A [`Config`] is assembled from up to four TOML layers. Later layers win:
//!
//! 1. `defaults.toml`, embedded in the binary
//! 2. the user file, `~/.botvy/config.toml`
//! 3. the workspace file, `{workspace}/botvy.toml`
//! 4. `BOTVY_PLUGINS_DIR`, `BOTVY_ACTIVE_PLUGINS`, `BOTVY_LOG_LEVEL` and
//!    `BOTVY_LOG_FORMAT`
//!
//! Tables merge key by key. Arrays and scalars are replaced wholesale.
//!
//! ```rust,no_run
//! # fn main() -> botvy_config::ConfigResult<()> {
//! let resolved = botvy_config::Config::load(Some(std::path::Path::new(".")))?;
//! println!("plugins: {}", resolved.config.plugins.directory.display());
//! # Ok(())
//! # }
//! ```

/// `BOTVY_*` overrides.
pub mod env;
/// [`ConfigError`].
pub mod error;
/// Finding and reading the layers.
pub mod loader;
/// Deep merge of TOML layers.
pub mod merge;
/// The typed config tree.
pub mod types;
/// Range checks run after merging.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ResolvedConfig, WORKSPACE_CONFIG_FILE};
pub use merge::ConfigLayer;
pub use types::*;

impl Config {
    /// Merge every layer that exists for `workspace_root`.
    ///
    /// # Errors
    ///
    /// Fails if a layer cannot be parsed or the merged result is invalid.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None)
    }

    /// Like [`Config::load`], reading the user layer from `botvy_home`
    /// instead of `~/.botvy`.
    ///
    /// # Errors
    ///
    /// Fails if a layer cannot be parsed or the merged result is invalid.
    pub fn load_with_home(
        workspace_root: Option<&std::path::Path>,
        botvy_home: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, Some(botvy_home))
    }

    /// Read exactly one file, with no other layers.
    ///
    /// # Errors
    ///
    /// Fails if `path` is missing, unparsable or invalid.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
