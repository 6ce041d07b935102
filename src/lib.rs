pub mod answers;
pub mod auth;
pub mod cli;
pub mod error;
pub mod expr;
pub mod notify;
pub mod schema;
pub mod store;
pub mod submission;
