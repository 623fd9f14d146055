//!  Storage is organized through [session_store::SessionStoreImpl] and
//!  [categories::CategoryRegistry]. The basic idea is:
//!   - There is a directory with all the session records.
//!   - Sessions are stored as JSON lines in day files keyed by the UTC date
//!     of their start.
//!   - Categories live next to it in a single ordered JSON file.

pub mod categories;
pub mod entities;
pub mod session_store;
