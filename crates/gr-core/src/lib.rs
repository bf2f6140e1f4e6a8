//! Shared vocabulary for the generative-backend router: endpoint identity,
//! dispatch policies, conversation turns, and the caller-visible error taxonomy.

pub mod error;
pub mod types;

pub use error::{ErrorKind, RouterError};
pub use types::{EndpointId, OutputFormat, Policy, Role, Turn};
