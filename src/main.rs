#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trellis::cli::run().await
}
