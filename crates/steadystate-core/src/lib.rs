//! Steadystate lifecycle engine
//!
//! This crate reconciles a locally declared desired configuration against
//! remotely managed objects that are identified by composite keys and that
//! only become visible to reads some time after a mutation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 host (steady CLI)                │
//! │        create / read / update / delete           │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ResourceData + InvocationContext
//! ┌─────────────────▼───────────────────────────────┐
//! │                Lifecycle<R>                      │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────────┐ │
//! │  │ Identity │ │  Finder  │ │   Change Plan    │ │
//! │  │  Codec   │ │ (paged)  │ │ (one replace)    │ │
//! │  └──────────┘ └──────────┘ └──────────────────┘ │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Stabilizer (poll until converged)       │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait Resource { ... }
//!           ┌───────▼───────┐
//!           │ resource kinds│
//!           └───────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod finder;
pub mod host;
pub mod identity;
pub mod lifecycle;
pub mod plan;
pub mod stabilizer;
pub mod state;

// Re-exports
pub use config::{EngineConfig, Phase, StabilizeConfig, Timeouts};
pub use context::InvocationContext;
pub use error::{BoxError, CoreError, Result};
pub use finder::{Page, collect_all, find_member, paginate};
pub use host::{Diagnostic, Diagnostics, ResourceData, Severity};
pub use identity::IdentityCodec;
pub use lifecycle::{Lifecycle, ReadOutcome, Resource};
pub use plan::{Change, ChangeKind, ChangeSet, ChangeSummary, FieldDiff, membership_delta};
pub use stabilizer::{StabilizeError, Stabilizer};
pub use state::{HostState, InstanceRecord, StateLock, StateManager};
