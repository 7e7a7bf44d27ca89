//! Trellis - application intent compiler for platform engineering
//!
//! Trellis compiles a developer-centric application description (an
//! [`AppConfiguration`](app::AppConfiguration)) into an ordered,
//! cross-referenced set of infrastructure resources (an
//! [`Intent`](intent::Intent)) that a reconciliation engine later applies
//! against heterogeneous runtimes: Kubernetes clusters and cloud-provider
//! APIs driven through Terraform resources.
//!
//! # Architecture
//!
//! Compilation is a two-phase pipeline over in-memory data:
//!
//! 1. **Generators** run in a fixed order, each appending the resources it
//!    owns to the intent: namespace, database accessory, workload, traits,
//!    and finally the ordering pass that assigns `dependsOn` edges.
//! 2. **Patchers** run after all generation, mutating already-generated
//!    resources in place, indexed by Group-Version-Kind.
//!
//! The pipeline is synchronous, single-threaded, and free of I/O: identical
//! input produces a byte-identical intent on every run.
//!
//! # Modules
//!
//! - [`app`] - The developer-facing application model (workload, accessories, traits)
//! - [`intent`] - The compiler output vocabulary (Resource, Intent, IDs, ResourceGraph)
//! - [`k8s`] - Typed Kubernetes objects emitted by the generators
//! - [`tf`] - Terraform provider descriptors and cloud configuration
//! - [`compiler`] - The generator/patcher framework and every pipeline pass
//! - [`error`] - Error types for the compiler

#![deny(missing_docs)]

pub mod app;
pub mod compiler;
pub mod error;
pub mod intent;
pub mod k8s;
pub mod tf;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key carrying the application name on every generated workload
pub const APP_NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label key carrying the owning project on every generated workload
pub const PART_OF_LABEL: &str = "app.kubernetes.io/part-of";
