//! Repository functions, one module per aggregate. All take a pool reference
//! and return domain types; SQL stays inside this module tree.

pub mod collections;
pub mod grants;
pub mod organisations;
pub mod submissions;
pub mod users;
