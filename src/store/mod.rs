//! SQLite persistence: connection setup, embedded migrations and the
//! repository functions the CLI talks to.

pub mod db;
pub mod migrations;
pub mod repository;
