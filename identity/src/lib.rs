//! Voter identity material for a run.
//!
//! - **Seed phrases**: 24-word BIP39 mnemonics from 256 bits of OS entropy
//! - **Account ids**: 1-based, handed out in order, never reused within a run

pub mod accounts;
pub mod mnemonic;

pub use accounts::AccountAllocator;
pub use mnemonic::{generate_seed, validate_seed, IdentityError, IdentityFactory};
