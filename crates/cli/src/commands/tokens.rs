use std::path::{Path, PathBuf};

use codesage_agent::{Confidence, CountMethod};

pub async fn run(
    config_path: Option<&Path>,
    text: Option<String>,
    file: Option<PathBuf>,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let text = match (text, file) {
        (_, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        (Some(text), None) => text,
        (None, None) => return Err("Provide TEXT or --file".into()),
    };

    let model = model.unwrap_or_else(|| config.default_model.clone());
    let profile = super::registry(&config).get(&model);
    let tokenizer = super::load_tokenizer();
    let count = codesage_agent::count_tokens(&tokenizer, &text, &profile);

    println!("🔢 {} tokens", count.count);
    println!("   Model:      {}", profile.name);
    println!("   Method:     {}", method_label(count.method));
    println!("   Confidence: {}", confidence_label(count.confidence));
    println!(
        "   Budget:     {} of {} prompt tokens",
        count.count,
        profile.available_prompt_tokens()
    );
    Ok(())
}

fn method_label(method: CountMethod) -> &'static str {
    match method {
        CountMethod::Tiktoken => "tiktoken",
        CountMethod::ProviderHeuristic => "provider heuristic",
        CountMethod::GenericHeuristic => "generic heuristic",
    }
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Low => "low",
        Confidence::Medium => "medium",
        Confidence::High => "high",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_lowercase() {
        assert_eq!(method_label(CountMethod::ProviderHeuristic), "provider heuristic");
        assert_eq!(confidence_label(Confidence::High), "high");
    }
}
