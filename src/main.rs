use event_courier::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
