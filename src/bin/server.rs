#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    zpanalytics::server::start_server().await
}
