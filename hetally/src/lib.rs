//! Homomorphic vote tallying.
//!
//! Ballots arrive encrypted under an additively homomorphic scheme and are
//! summed into one running ciphertext on the ledger. Only the holder of the
//! secret key can read the per-candidate totals, and no individual ballot is
//! ever decrypted by the tallying path.

#[macro_use]
extern crate serde;

pub mod accumulator;
mod ballot;
mod bfv;
mod config;
mod context;
mod contract;
mod error;
mod ledger;
mod params;
mod scheme;
mod stage;
mod wire;

pub use ballot::*;
pub use bfv::*;
pub use config::*;
pub use context::*;
pub use contract::*;
pub use error::*;
pub use ledger::*;
pub use params::*;
pub use scheme::*;
pub use stage::*;
pub use wire::*;

#[cfg(test)]
mod test_util;

#[cfg(test)]
mod tests;
