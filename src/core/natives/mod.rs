// ─── Native Extraction ───
// Pulls platform binaries out of classifier jars, filtered by the real
// machine type in each member's header.

pub mod binary;
pub mod extract;

pub use extract::{extract_natives, extract_natives_blocking, ExtractionReport};
