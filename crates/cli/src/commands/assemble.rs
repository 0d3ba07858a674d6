use std::path::{Path, PathBuf};
use std::sync::Arc;

use codesage_agent::{
    AssembledPrompt, AssemblySettings, ContextAssembler, ContextGatherer, CorrectionTrigger,
    GatherRequest, GatherSettings, default_system_prompt,
};
use codesage_config::AppConfig;
use codesage_core::tool::ToolCatalog;
use codesage_core::turn::ConversationTurn;
use codesage_store::{FsContentStore, KeywordSearchProvider};

/// Inputs for one `assemble` run.
pub struct AssembleArgs {
    pub root: PathBuf,
    pub query: String,
    pub model: Option<String>,
    pub paths: Vec<String>,
    pub implicit: Option<String>,
    pub history: Option<PathBuf>,
    pub search: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    args: AssembleArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let history = match &args.history {
        Some(path) => super::read_history(path)?,
        None => Vec::new(),
    };
    let prompt = build_prompt(&config, &args, history, super::load_tokenizer()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prompt)?);
        return Ok(());
    }

    println!("{}", prompt.text);
    eprintln!();
    eprintln!(
        "🧮 {} / {} tokens ({} segments)",
        prompt.total_tokens,
        prompt.budget,
        prompt.segments.len()
    );
    if !prompt.truncated.is_empty() {
        eprintln!("   Truncated: {}", prompt.truncated.join(", "));
    }
    if !prompt.skipped.is_empty() {
        eprintln!("   Skipped:   {}", prompt.skipped.join(", "));
    }
    for warning in &prompt.warnings {
        eprintln!("   ⚠️  {warning}");
    }
    Ok(())
}

/// Gather from the project on disk and pack for the chosen model.
pub async fn build_prompt(
    config: &AppConfig,
    args: &AssembleArgs,
    history: Vec<ConversationTurn>,
    tokenizer: Arc<codesage_agent::Tokenizer>,
) -> Result<AssembledPrompt, Box<dyn std::error::Error>> {
    let store = Arc::new(
        FsContentStore::new(&args.root)
            .map_err(|e| format!("Cannot open project {}: {e}", args.root.display()))?,
    );

    let mut gatherer = ContextGatherer::new(store.clone(), tokenizer.clone())
        .with_settings(GatherSettings::from(&config.context));
    if args.search {
        gatherer = gatherer.with_search_provider(Arc::new(KeywordSearchProvider::new(store)));
    }

    let system_prompt = config
        .system_prompt_override
        .clone()
        .unwrap_or_else(|| default_system_prompt(&ToolCatalog::codebase_tools()));
    let project_id = args.root.display().to_string();

    let analysis =
        CorrectionTrigger::from_config(&config.correction).analyze(&history, &args.query);

    let mut request = GatherRequest::new(project_id, system_prompt, &args.query)
        .with_explicit_paths(args.paths.clone())
        .with_history(history);
    if let Some(path) = &args.implicit {
        request = request.with_implicit_path(path);
    }
    if let Some(directive) = analysis.prompt_segment {
        request = request.with_correction(directive);
    }

    let model = args.model.as_deref().unwrap_or(&config.default_model);
    let profile = super::registry(config).get(model);
    let items = gatherer.gather(&request, &profile).await;

    let assembler =
        ContextAssembler::new(tokenizer).with_settings(AssemblySettings::from(&config.context));
    Ok(assembler.assemble(items, &profile))
}
