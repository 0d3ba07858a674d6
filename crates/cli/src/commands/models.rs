use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let registry = super::registry(&config);

    println!("📐 Model Profiles");
    println!();
    println!(
        "  {:<32} {:>8} {:>9} {:>8}  {:<10} {}",
        "MODEL", "LIMIT", "RESERVED", "PROMPT", "PROVIDER", "ENCODING"
    );
    for profile in registry.profiles() {
        let marker = if profile.name == config.default_model { "*" } else { " " };
        println!(
            "{marker} {:<32} {:>8} {:>9} {:>8}  {:<10} {}",
            profile.name,
            profile.token_limit,
            profile.reserved_output_tokens,
            profile.available_prompt_tokens(),
            profile.provider.as_str(),
            profile.encoding.map(|e| e.as_str()).unwrap_or("-"),
        );
    }
    println!();
    println!("  * default model ({})", config.default_model);
    Ok(())
}
