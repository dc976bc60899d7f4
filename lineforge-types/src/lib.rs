//! Shared DTOs for the lineforge workspace.
//!
//! # Design constraints
//! - Records mirror whatever the remote ad server returns; unknown fields are
//!   preserved, never dropped.
//! - Identifiers distinguish server-assigned ids from dry-run synthetic ids at
//!   the type level, so a simulated record can never be mistaken for a real one.

mod filter;
mod media;
mod money;
mod object;
mod record;

pub use filter::{Filter, FilterClause};
pub use media::{MediaType, Size};
pub use money::Cpm;
pub use object::ObjectType;
pub use record::{Id, NaturalKey, Record};
