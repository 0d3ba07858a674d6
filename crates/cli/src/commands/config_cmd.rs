use std::path::Path;

use codesage_config::AppConfig;

pub async fn run(
    config_path: Option<&Path>,
    default: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = super::load_config(config_path)?;
    let source = match config_path {
        Some(path) => path.display().to_string(),
        None => AppConfig::config_dir().join("config.toml").display().to_string(),
    };
    println!("# Effective configuration ({source})");
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
