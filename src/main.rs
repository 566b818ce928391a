#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jsonapi::cli::run_cli().await
}
