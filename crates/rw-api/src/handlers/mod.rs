//! Route handlers, one module per resource.

pub mod articles;
pub mod portals;
pub mod talk;
pub mod users;
