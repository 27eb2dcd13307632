use std::error::Error;

use clap::Parser;
use teapot_http::server::Server;
use teapot_web::api;
use teapot_web::config::{Cli, load_tls};
use tracing::{Dispatch, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let dispatch = Dispatch::new(FmtSubscriber::builder().with_max_level(cli.log_level).finish());
    let _guard = tracing::dispatcher::set_default(&dispatch);

    let tls = load_tls(&cli.cert, &cli.key).inspect_err(|e| error!(cause = %e, "failed to load tls material"))?;
    let server = Server::builder()
        .config(cli.server_config())
        .tls(tls)
        .handler(api::router()?)
        .dispatch(dispatch)
        .build()?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting teapot");
    server.start().await.inspect_err(|e| error!(cause = %e, "server stopped"))?;
    Ok(())
}
