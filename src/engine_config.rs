use anyhow::{Context, Result};
use toshiba_ac_lib::config::EngineConfig;

/// Reads the unit capabilities, all keys are optional.
pub fn load(config_file_path: Option<&str>) -> Result<EngineConfig> {
    let Some(config_file_path) = config_file_path else {
        return Ok(EngineConfig::default());
    };
    log::debug!("Loading unit config from {config_file_path:?}");
    let config_file = std::fs::File::open(config_file_path)
        .with_context(|| format!("Cannot open unit config file {config_file_path:?}"))?;
    let config: EngineConfig = serde_yaml::from_reader(&config_file)
        .with_context(|| format!("Cannot read unit config from file: {config_file_path:?}"))?;
    if config.min_temperature > config.max_temperature {
        anyhow::bail!(
            "min_temperature {} is above max_temperature {}",
            config.min_temperature,
            config.max_temperature
        );
    }
    Ok(config)
}
