//! # CretoAI Policy Engine
//!
//! Embeddable authorization policy core: rule tables, role hierarchies and
//! the mutation protocol that keeps them consistent.
//!
//! ## Features
//!
//! - **Typed rule tables** per section (`p` / `g`) and ptype, duplicate-free and insertion ordered
//! - **Role graphs** per grouping ptype, domain aware, with optional pattern matching
//! - **Atomic mutations** that rebuild role links before returning
//! - **Adapters and watchers** notified after every committed change
//! - **Function registry** shared with an external request evaluator
//!
//! ## Module Structure
//!
//! ```text
//! policy/
//! ├── model/      - Rule-family definitions and field indexes
//! ├── store/      - Rule tables
//! ├── roles/      - Role graphs and role managers
//! ├── functions/  - Named predicates and built-in matchers
//! ├── persist/    - Adapters and watchers
//! └── enforcer/   - Public management and role API
//! ```
//!
//! ## Example
//!
//! ```rust
//! use cretoai_policy::{Enforcer, Model};
//!
//! let model = Model::new()
//!     .with_policy("p", ["sub", "obj", "act"])
//!     .and_then(|m| m.with_role("g", 2))
//!     .unwrap();
//! let enforcer = Enforcer::new(model);
//!
//! enforcer.add_policy(["admin", "data1", "read"]).unwrap();
//! enforcer.add_grouping_policy(["alice", "admin"]).unwrap();
//!
//! assert_eq!(enforcer.get_roles_for_user("alice").unwrap(), vec!["admin"]);
//! assert_eq!(enforcer.get_all_subjects().unwrap(), vec!["admin"]);
//! ```

pub mod config;
pub mod enforcer;
pub mod error;
pub mod functions;
pub mod model;
pub mod persist;
pub mod roles;
pub mod rule;
pub mod store;

pub use config::{EnforcerConfig, ModelConfig};
pub use enforcer::{Enforcer, Evaluator, PolicyView};
pub use error::{PolicyError, Result};
pub use functions::{Function, FunctionRegistry};
pub use model::{Model, PolicyDefinition};
pub use persist::{Adapter, FileAdapter, MemoryAdapter, PolicyChange, PolicyLine, Watcher};
pub use roles::RoleManager;
pub use rule::{IntoRule, Rule, Section};
pub use store::{AddMode, PolicyStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
