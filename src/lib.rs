//! PowerMax Provider - Declarative Reconciliation
//!
//! Reconciles hosts, host groups, port groups, masking views, storage groups
//! and volumes on a PowerMax array against a desired configuration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     Provider API (axum, /v1/...)                      │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                  Provider Registry (JSON dispatch)                    │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                     Lifecycle Orchestrators                           │
//! │   create · read · update · delete · import, per resource type        │
//! ├──────────────────────────────┬───────────────────────────────────────┤
//! │     Diff-and-Update Engine   │         State Projection              │
//! │   (one call per field group) │   (create / read / update / import)   │
//! ├──────────────────────────────┴───────────────────────────────────────┤
//! │        Identity & Comparison Utilities  ·  Flag Codec                 │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                    Array Client Port (ArrayClient)                    │
//! │   ┌──────────────────────┐   ┌────────────────────────────────────┐  │
//! │   │  Instrumented Client │──►│  Memory Array (simulated PowerMax) │  │
//! │   └──────────────────────┘   └────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Array types, the client port, comparison utilities and the flag codec
//! - [`model`]: Plan and state shape of each resource
//! - [`projection`]: Folding array state into provider state
//! - [`reconcile`]: Diff-and-update engine
//! - [`provider`]: Lifecycle orchestrators and the provider registry
//! - [`backends`]: Array client implementations
//! - [`api`]: HTTP surface
//! - [`config`]: Configuration loading
//! - [`error`]: Error types and handling

pub mod api;
pub mod backends;
pub mod config;
pub mod domain;
pub mod error;
pub mod model;
pub mod projection;
pub mod provider;
pub mod reconcile;

// Re-export commonly used types
pub use api::{ApiServer, RestRouter};

pub use backends::{
    BackendFactory, ClientMetrics, InstrumentedClient, MemoryArray, MemoryArrayConfig,
};

pub use config::{ApiConfig, ArrayConfig, LoggingConfig, ProviderConfig};

pub use domain::flags::{apply_overrides, Flag, HostFlag, HostFlags};
pub use domain::ports::{ArrayClient, ArrayClientRef, CallContext, Operation};

pub use error::{Error, ErrorCategory, Result};

pub use model::{
    HostGroupModel, HostModel, MaskingViewModel, PortGroupModel, StorageGroupModel, VolumeModel,
};

pub use projection::ProjectionMode;

pub use provider::{
    Applied, Diagnostic, LifecycleOp, LifecycleRequest, LifecycleResponse, Provider, Resource,
    ResourceKind, Severity,
};

pub use reconcile::{FieldGroup, UpdateReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
