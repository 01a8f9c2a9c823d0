pub mod layout;
pub mod orchestrator;

pub use layout::InstallLayout;
pub use orchestrator::{ProvisionReport, Provisioner};
