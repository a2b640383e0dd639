pub mod lifecycle;
pub mod publisher;
pub mod registry;

pub use publisher::{runtime_ruleset_key, PointerDoc, Publisher, RulesetPublisher};
pub use registry::RegistryService;
