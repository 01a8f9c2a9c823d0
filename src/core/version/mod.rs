pub mod arguments;
pub mod manifest;
pub mod rules;
pub mod version_file;

pub use arguments::{Argument, ArgumentValue, Arguments};
pub use manifest::{VersionEntry, VersionManifest};
pub use rules::{evaluate, Rule, RuleAction, RuleOutcome};
pub use version_file::{Artifact, LibraryEntry, VersionJson};
