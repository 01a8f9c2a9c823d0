pub mod resolver;

pub use resolver::{classpath, plan_library, LibraryPlan, LibraryResolver, LibrarySummary};
