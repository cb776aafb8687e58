//! dispatchd: a WebSocket command-dispatch daemon.
//!
//! Accepts HTTP upgrade requests on a configured port and serves a one-line
//! text command protocol over each upgraded connection:
//! - `echo <text>`: reply with `<text>`
//! - `exec <path>`: launch `<path>` as a detached process, no reply
//!
//! Configuration comes from CLI arguments or a TOML file.

use dispatchd::config::Config;
use dispatchd::logging;
use dispatchd::server::Server;
use tracing::error;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    logging::init(&config);

    // Failing to bind is the one fatal condition; everything after this is
    // scoped to a single connection.
    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!(address = %config.listen_addr(), error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };

    server.run().await;
}
