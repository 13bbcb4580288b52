//! Calculator server.
//!
//! ```text
//! calc-server [BIND_ADDR]
//! ```
//!
//! `TURNWIRE_CONFIG` may name a JSON [`ServerConfig`] file; a bind address
//! on the command line overrides the one it contains.

use calculator::Calculator;
use turnwire::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    turnwire::logging::init("info");

    let mut config = match std::env::var_os("TURNWIRE_CONFIG") {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(addr) = std::env::args().nth(1) {
        config.bind_addr = addr;
    }

    let server = ServerBuilder::from_config(config).build(Calculator::new()).await?;
    tracing::info!(addr = %server.local_addr()?, "calculator ready");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
