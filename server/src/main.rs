use server::config::Config;
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let config = Config::load();
    log::info!("starting with config: {:?}", config);

    let server = Server::bind(&config).await?;
    server.run().await
}
