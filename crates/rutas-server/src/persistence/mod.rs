//! SQLite storage for the road edge list and the station catalogue.
//!
//! The routing engine never reads the database directly: rows are turned into
//! core `EdgeRecord` and `Station` values and handed to the graph and station
//! builders.

pub mod db;
pub mod road_edges;
pub mod stations;

pub use db::{init_database, Database};
