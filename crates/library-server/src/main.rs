#[tokio::main]
async fn main() -> anyhow::Result<()> {
    library_server::run().await
}
