//! `talkbot config`: configuration commands.

use talkbot_config::AppConfig;

/// Print the default configuration as TOML.
pub fn show() {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    print!("{}", AppConfig::default_toml());
}

/// Load the configuration (file plus environment) and report on it.
pub fn check() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = AppConfig::load().map_err(|e| {
        println!("   Config error: {e}");
        e
    })?;
    println!("   Config parsed successfully");

    if config.default_provider == "openrouter" && !config.has_api_key() {
        println!("   Warning: no API key set (set OPENROUTER_API_KEY or TALKBOT_API_KEY)");
    }

    println!();
    println!("   Provider:        {}", config.default_provider);
    println!("   Model:           {}", config.default_model);
    println!("   Max iterations:  {}", config.agent.max_iterations);
    println!("   History:         {} messages", config.agent.max_history_messages);
    println!("   Thinking:        {}", config.agent.enable_thinking);
    println!("   Data dir:        {}", config.data_dir().display());
    Ok(())
}
