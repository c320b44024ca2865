//! # Warden Engine
//!
//! Server-side client-integrity verification. The engine challenges a
//! connected client to prove it runs unmodified and punishes it when it
//! cannot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   on_bytes / update   ┌─────────────────────────────────┐
//! │  Connection  │ ────────────────────► │ IntegrityEngine                 │
//! │  (owner)     │ ◄──── Transport ───── │  ├─ StreamCipher x2             │
//! └──────────────┘                       │  ├─ ClientPlatform (Win32)      │
//!         ▲                              │  ├─ CategoryScheduler           │
//!         └────── SessionControl ─────── │  └─ PenaltyPolicy               │
//!                                        └───────────────┬─────────────────┘
//!                                                        │ Arc (read-only)
//!                                                ┌───────▼───────┐
//!                                                │ CheckCatalog  │
//!                                                └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let catalog = Arc::new(CheckCatalog::from_store(&store, config.fail_action)?);
//! let mut engine = IntegrityEngine::new(config, catalog, platform, transport, session, Instant::now())?;
//!
//! // connection read loop
//! engine.on_bytes(Instant::now(), &message);
//! // connection tick
//! engine.update(Instant::now());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod engine;
pub mod error;
pub mod penalty;
pub mod platform;
pub mod scheduler;
pub mod simulation;
pub mod traits;

pub use config::{ConfigError, WardenConfig};
pub use engine::{EngineStats, HandshakeState, IntegrityEngine, Lifecycle, PendingRequest};
pub use error::{EngineError, EngineResult};
pub use penalty::{ActionTaken, PenaltyPolicy};
pub use platform::{CheckFailure, ClientPlatform, FailureReason, ResultReport, TimingReply, Win32Platform};
pub use scheduler::{CategoryQueue, CategoryScheduler};
pub use traits::{SessionControl, Transport};
