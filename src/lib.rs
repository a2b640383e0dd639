pub mod api;
pub mod artifacts;
pub mod canonical;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::Config;
pub use domain::{ConditionNode, EntityStatus, Operator, RuleType};
pub use errors::{Error, Result};
