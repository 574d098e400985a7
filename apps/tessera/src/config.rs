//! # Configuration
//!
//! Settings are layered, highest precedence first:
//!
//! 1. CLI flags (`--database`, `--config`)
//! 2. Environment (`TESSERA_LOG_FORMAT`, `RUST_LOG`; read in `main`)
//! 3. The TOML configuration file
//! 4. Built-in defaults
//!
//! ```toml
//! [database]
//! path = "tessera.redb"
//!
//! [[types]]
//! uri = "name"
//! data_kind = "text"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tessera_core::{SchemaDocument, TesseraError};

/// Configuration file looked up in the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tessera.toml";

/// Database used when neither the CLI nor the file names one.
pub const DEFAULT_DATABASE: &str = "tessera.redb";

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Types installed by `init`.
    #[serde(flatten)]
    pub schema: SchemaDocument,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self, TesseraError> {
        toml::from_str(text)
            .map_err(|e| TesseraError::Serialization(format!("Invalid configuration: {}", e)))
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> Result<Self, TesseraError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TesseraError::Io(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(TesseraError::Serialization(format!(
                "Configuration file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::Io(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        let config = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), types = config.schema.types.len(), "loaded configuration");
        Ok(config)
    }

    /// The explicitly given file, else `tessera.toml` if present, else
    /// defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, TesseraError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// The database path: CLI flag, then file, then default.
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }
}
