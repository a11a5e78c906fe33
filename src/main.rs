use serde_json::json;
use tracing::{error, info, Level};

use market_yield::{
    configuration::{get_configuration, set_configuration, AppState, Config, State},
    error::Error,
    handler::pools,
    provider::{Evm, HTTP},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let result = app_main().await;

    if let Err(err) = &result {
        error!("{}", err);
    }

    result
}

async fn app_main() -> Result<(), Error> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_level(true)
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = match init() {
        Ok(config) => config,
        Err(e) => return Err(Error::ConfigurationError(e.to_string())),
    };

    let evm = Evm::new(config.clone())?;
    let http = HTTP::new(config.clone())?;
    let app_state = AppState::new(State::new(config, evm, http));

    info!(
        "Computing pools for {} on {}",
        app_state.config.project_name, app_state.config.chain
    );

    let pools = pools::fetch_pools(&app_state).await?;
    let output = json!({
        "project": app_state.config.project_info(),
        "pools": pools,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn init() -> Result<Config, Error> {
    set_configuration()?;
    let config = get_configuration()?;
    Ok(config)
}
