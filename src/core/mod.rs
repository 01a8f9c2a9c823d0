// ─── Provisioner Core ───
// Turns a version descriptor into a runnable installation on disk.
//
// Architecture:
//   core/
//     version/    - Version manifest, descriptor JSON, OS rules and arguments
//     downloader/ - Bounded, retrying downloads with SHA-1 validation
//     libraries/  - Library planning, installation and classpath
//     natives/    - Architecture-aware native extraction
//     assets/     - Asset index + object downloads
//     install/    - Directory layout + provisioning orchestrator
//     java/       - Java installation discovery
//     config/     - Persistent settings

pub mod assets;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod java;
pub mod libraries;
pub mod natives;
pub mod platform;
pub mod version;
