// ─── Java Discovery ───
// Finds local Java installations and labels them by major version.

pub mod discovery;
pub mod probe;

pub use discovery::{select_java, JavaDiscovery, JavaInstallations};
pub use probe::{parse_version_label, probe_java_dir};
