//! Role hierarchy derived from grouping rules
//!
//! Each grouping ptype owns one [`RoleManager`], rebuilt from the store
//! whenever that ptype's rules change (or on demand when automatic rebuilds
//! are turned off).

pub mod graph;
pub mod manager;

pub use graph::RoleGraph;
pub use manager::{NamedFunction, RoleManager};
