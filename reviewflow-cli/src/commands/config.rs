use anyhow::Result;
use reviewflow_runner::PipelineConfig;

/// Prints the configuration after defaults, file and environment are merged
pub fn print_config(config: &PipelineConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
