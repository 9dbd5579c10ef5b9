//! Link-domain identifiers and the record stored for every issued token.

pub mod id;
pub mod record;

pub use id::*;
pub use record::*;
