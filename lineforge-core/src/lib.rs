//! Embeddable provisioning pipeline for lineforge.
//!
//! Clap-free and transport-agnostic: callers supply the declarative
//! configuration and an [`lineforge_gateway::AdServer`] implementation, and
//! [`run_provision`](pipeline::run_provision) drives the full
//! RESOLVE_REFS → BUILD_BATCHES → CLEANUP state machine over them.
//!
//! Failure semantics: any fatal error aborts the batch loop, triggers the
//! best-effort compensating archive of every order created during the run,
//! and is then re-raised. There is no partial-success continuation.

pub mod pipeline;
pub mod settings;

pub use pipeline::{run_provision, ProvisionOutcome};
pub use settings::ProvisionSettings;

// Re-export the domain error taxonomy so embedders can downcast without
// depending on lineforge-domain directly.
pub use lineforge_domain::ProvisionError;
