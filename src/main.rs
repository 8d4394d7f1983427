use std::sync::Arc;
use turnstile::logger::*;
use turnstile::server::*;
use turnstile::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::init();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    logger.reload(&project_settings.log.filter)?;
    info!(
        storage = %project_settings.storage.backend,
        gateway = %project_settings.gateway.backend,
        "starting turnstile"
    );

    if project_settings.bot.token.is_empty() {
        return Err(anyhow::anyhow!("bot token is required"));
    }

    let server = Arc::new(Server::try_new(&project_settings).await?);
    server.run().await;
    server.shutdown().await;

    Ok(())
}
