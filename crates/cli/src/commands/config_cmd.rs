//! `gradwise config`: configuration management commands.

use gradwise_config::AppConfig;

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        println!("Config already exists: {}", config_path.display());
        println!("  Run with --force to overwrite it.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Wrote default config: {}", config_path.display());
    println!();
    println!("Set an API key to enable the completion backend:");
    println!("  export OPENAI_API_KEY=sk-...");
    println!("Without one, Gradwise answers with keyword rules and formatted tool results.");
    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        println!("# No API key set: decisions and replies use the offline fallback.");
        println!();
    }
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("***".into());
        }
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_under_config_dir() {
        let path = gradwise_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_string_lossy().contains(".gradwise"));
    }

    #[test]
    fn default_toml_round_trips() {
        let text = gradwise_config::AppConfig::default_toml();
        let parsed = gradwise_config::AppConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.context.budget, 2000);
    }
}
