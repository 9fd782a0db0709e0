#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ccs811_client::client().await
}
