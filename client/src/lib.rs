//! Client side of the election service.
//!
//! [`Backend`] is the capability the orchestrator drives: one async method per
//! remote operation, no business logic. [`GraphQlClient`] implements it over
//! the service's GraphQL endpoint.

pub mod backend;
pub mod error;
pub mod graphql;

pub use backend::{Backend, Operation};
pub use error::ClientError;
pub use graphql::{ClientOptions, GraphQlClient, DEFAULT_ENDPOINT};
