//! Value types for the votestorm workload driver.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! the election definition submitted to the backend, the handle it returns,
//! account identifiers, vote-weight amounts, encoded answers, ballots and the
//! aggregated results.

pub mod account;
pub mod amount;
pub mod answer;
pub mod ballot;
pub mod election;
pub mod error;
pub mod handle;
pub mod keys;
pub mod results;

pub use account::{Account, AccountId};
pub use amount::VoteWeight;
pub use answer::{encode_answer, EncodedAnswer};
pub use ballot::Ballot;
pub use election::{Choice, ElectionSpec, ElectionSpecBuilder, Question};
pub use error::TypesError;
pub use handle::ElectionHandle;
pub use keys::{DecodingSeed, SeedPhrase};
pub use results::{ResultSet, TallyEntry};
