#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tlsinterop::cli::start().await
}
