//! # Check Store
//!
//! Where check rows come from. Production deployments put a database behind
//! `CheckStore`; `TomlCheckStore` reads the same rows from a file:
//!
//! ```toml
//! [[check]]
//! id = 7
//! kind = 0xF3
//! address = 0x00CF0BC8
//! length = 4
//! result = "8B4C2404"
//! comment = "speed hack"
//!
//! [[override]]
//! id = 7
//! action = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::definition::{CheckRow, OverrideRow};
use crate::error::{CatalogError, CatalogResult};

/// Source of check definitions and action overrides.
pub trait CheckStore {
    /// Returns every stored check row.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_check_definitions(&self) -> CatalogResult<Vec<CheckRow>>;

    /// Returns every stored action override.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_action_overrides(&self) -> CatalogResult<Vec<OverrideRow>>;
}

/// On-disk layout of a catalog file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Check rows.
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckRow>,
    /// Action overrides.
    #[serde(default, rename = "override")]
    pub overrides: Vec<OverrideRow>,
}

/// `CheckStore` over an in-memory catalog file.
#[derive(Clone, Debug, Default)]
pub struct TomlCheckStore {
    file: CatalogFile,
}

impl TomlCheckStore {
    /// Parses a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] on malformed TOML or schema mismatch.
    pub fn from_toml_str(text: &str) -> CatalogResult<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        Ok(Self { file })
    }

    /// Reads and parses a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Wraps rows that are already in memory.
    #[must_use]
    pub fn from_rows(checks: Vec<CheckRow>, overrides: Vec<OverrideRow>) -> Self {
        Self {
            file: CatalogFile { checks, overrides },
        }
    }

    /// Returns the parsed file.
    #[must_use]
    pub fn file(&self) -> &CatalogFile {
        &self.file
    }
}

impl CheckStore for TomlCheckStore {
    fn load_check_definitions(&self) -> CatalogResult<Vec<CheckRow>> {
        Ok(self.file.checks.clone())
    }

    fn load_action_overrides(&self) -> CatalogResult<Vec<OverrideRow>> {
        Ok(self.file.overrides.clone())
    }
}
