use log::{error, info, LevelFilter};
use rocket::Error as RocketError;
use thiserror::Error;

/// Logging configuration used unless `EVOTE_LOG_CONFIG` names another file.
const DEFAULT_LOG_CONFIG: &str = "log4rs.yaml";

/// Errors that stop the server from starting or keep it from running.
#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Rocket(#[from] RocketError),
}

async fn serve() -> Result<(), Error> {
    info!("Preparing vote admission...");
    let rocket = evote_backend::build().ignite().await?;
    info!("...ledger, registry and abuse log ready");
    // Request logging is done by our own fairing from here on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    let _ = rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    let log_config =
        std::env::var("EVOTE_LOG_CONFIG").unwrap_or_else(|_| DEFAULT_LOG_CONFIG.to_string());
    if let Err(err) =
        log4rs::init_file(&log_config, log4rs_dynamic_filters::default_deserializers())
    {
        eprintln!("Failed to initialise logging from {log_config}: {err}");
        std::process::exit(1)
    }
    info!("Logging configured from {log_config}");

    if let Err(err) = serve().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
