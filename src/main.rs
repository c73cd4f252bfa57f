use measure_metrics::{api, config::Settings, logging};
use tracing::error;

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init_logger(env!("CARGO_CRATE_NAME"), settings.log_format) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = api::serve(&settings).await {
        error!("Metrics API stopped: {}", e);
        std::process::exit(1);
    }
}
