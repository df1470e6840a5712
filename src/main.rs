#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quota_proxy_lib::run().await
}
