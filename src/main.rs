use endpoint_mcp_bridge::{
    auth::{BearerTokenAuth, RequireIdentity},
    bridge::{generate, read_endpoints_file, GenerationOptions},
    config::Config,
    domain::middleware::MiddlewareConfig,
    logging,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let endpoints = read_endpoints_file(&config.endpoints_file)?;

    let mut options = GenerationOptions::from_config(&config);
    if let Some(token) = config.api_token.as_deref() {
        options = options.with_middleware(
            MiddlewareConfig::builder()
                .auth(BearerTokenAuth::new(token))
                .authz(RequireIdentity)
                .build(),
        );
    }

    let mut server = generate(endpoints, options)?;
    server.start().await?;

    info!(
        transport = %config.transport,
        address = ?server.address(),
        base_url = %config.base_url,
        "bridge running"
    );

    tokio::select! {
        _ = server.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    server.stop().await;
    Ok(())
}
