//! # Warden Catalog
//!
//! The set of integrity checks the server can ask a client to run.
//!
//! ## Lifecycle
//!
//! ```text
//! CheckStore ──rows──► CheckCatalog::load ──► apply_overrides ──► Arc<CheckCatalog>
//!                         │                                          │
//!                         └─ bad rows: warn + skip                   └─ read-only, shared
//!                                                                       by every connection
//! ```
//!
//! ## Categories
//!
//! | Category | Kinds                          |
//! |----------|--------------------------------|
//! | Inject   | PageA, PageB, Driver, Module   |
//! | Lua      | LuaEval                        |
//! | Modded   | Mem, Mpq                       |
//!
//! Timing and Proc belong to no category. Timing is synthesized by the
//! engine for every request; neither is loaded from rows.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod definition;
pub mod error;
pub mod kind;
pub mod store;

pub use catalog::{CheckCatalog, RejectedRow};
pub use definition::{
    lua_report_message, CheckDefinition, CheckRow, OverrideRow, CHECK_DATA_LEN, LUA_REPORT_TOKEN,
    MAX_LUA_CHECK_ID, MAX_LUA_CHECK_LENGTH, MAX_LUA_SCRIPT_LENGTH,
};
pub use error::{CatalogError, CatalogResult, RowError};
pub use kind::{Action, Category, CheckKind};
pub use store::{CatalogFile, CheckStore, TomlCheckStore};
