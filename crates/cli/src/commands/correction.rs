use std::path::{Path, PathBuf};

use codesage_agent::{CorrectionTrigger, ErrorKind};

pub async fn run(
    config_path: Option<&Path>,
    history: PathBuf,
    input: String,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let history = super::read_history(&history)?;

    let trigger = CorrectionTrigger::from_config(&config.correction);
    let analysis = trigger.analyze(&history, &input);
    let attempts = trigger.attempt_count(&history);

    if json {
        let report = serde_json::json!({
            "analysis": analysis,
            "attempts": attempts,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let Some(ctx) = &analysis.error_context else {
        println!("✅ No self-correction needed");
        println!("   Attempts in window: {}/{}", attempts.count, attempts.ceiling);
        return Ok(());
    };

    let reason = match ctx.kind {
        ErrorKind::ToolError => "tool error",
        ErrorKind::UserFeedbackError => "user feedback",
    };
    println!("🔁 Self-correction triggered ({reason})");
    println!("   Error: {}", ctx.error_message);
    if let Some(action) = &ctx.failed_action {
        println!("   Failed tool: {}", action.tool_name);
    }
    println!(
        "   Attempts in window: {}/{}{}",
        attempts.count,
        attempts.ceiling,
        if attempts.ceiling_reached { " (ceiling reached)" } else { "" }
    );
    if let Some(segment) = &analysis.prompt_segment {
        println!();
        println!("{segment}");
    }
    Ok(())
}
