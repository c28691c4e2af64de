// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access decisions of the PEP Access Manager.
//!
//! User-groups are granted modes on column-groups and participant-groups by access rules kept in
//! the temporal rule store of `pep-access-store`. This crate resolves those rules into answers:
//! which columns and participants a user-group may see, whether a ticket request is admissible
//! and what exactly the resulting ticket covers.
//!
//! All checks of a request are evaluated before it is rejected, so an error lists every reason at
//! once, one per line.
//!
//! The [`Backend`] bundles the rule store with its [`Config`], takes care of persistence and
//! exposes the administrative mutations, queries and checksum chains.
mod backend;
pub mod columns;
mod config;
mod error;
pub mod mutation;
pub mod participants;
pub mod query;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod ticket;

pub use backend::Backend;
pub use config::{Config, DEFAULT_ACCESS_ADMINISTRATOR, DEFAULT_DATA_ADMINISTRATOR};
pub use error::{Denial, Error, UnknownName};
