use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    featurehub::app::startup::startup().await
}
