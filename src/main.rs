use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match provisioner_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Provisioning failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
