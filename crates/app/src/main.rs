//! Hostel management server
//!
//! Serves rooms, allocations, maintenance, payments, complaints and
//! notifications to clients over TCP.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hostel_net::Server;

mod config;
mod error;
mod state;

use config::Config;
use error::Result;
use state::{AppState, ADMIN_PASSWORD_ENV};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting hostel server");

    if let Err(e) = run().await {
        tracing::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::load()?;
    let state = AppState::new(config)?;

    if let Some(admin) = state.bootstrap(std::env::var(ADMIN_PASSWORD_ENV).ok())? {
        match admin.generated_password {
            Some(password) => tracing::warn!(
                username = %admin.user.username,
                password = %password,
                "Created admin account with generated password; change it after first login"
            ),
            None => tracing::info!(username = %admin.user.username, "Created admin account"),
        }
    }

    let server = Server::start(
        state.config.listen,
        state.db.clone(),
        state.config.server_settings(),
    )
    .await?;
    tracing::info!(addr = %server.addr(), "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received");
    server.shutdown();

    Ok(())
}
