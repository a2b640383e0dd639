pub mod compile;
pub mod validator;

pub use compile::{compile, CompileInput, CompiledArtifact};
pub use validator::{parse_and_validate, validate_condition_tree};
