use gauntlet_config::GauntletConfig;
use gauntlet_models::LlmModel;
use utils::init_logging;

#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

mod utils;

const DEMO_SENTENCE: &str = "The quick brown fox jumps over the lazy dog";

fn main() -> anyhow::Result<()> {
    let config = GauntletConfig::new()?;

    init_logging(config.debug);

    info!("Loading model {}", config.model);
    let model = LlmModel::new(&config)?;

    let prediction = model.predict(DEMO_SENTENCE)?;
    println!("{prediction}");

    Ok(())
}
