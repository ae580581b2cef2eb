// Loads configuration from the environment and runs the service.

use review_assigner_lib::config::AppConfig;

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    review_assigner_lib::init_logging(&config);

    if let Err(e) = review_assigner_lib::run(config).await {
        log::error!("Service stopped with error: {}", e);
        std::process::exit(1);
    }
}
