#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockmeta_cli::cli::run().await
}
