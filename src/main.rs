use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use log::info;

use vocab_translator::llm::{CachedCompletion, CompletionClient, OpenAiClient};
use vocab_translator::pipeline::{
    init_default_config, ConfigOverrides, PipelineConfig, TemplateSource, VocabularyPipeline,
};
use vocab_translator::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "vocab-translator")]
#[command(
    about = "Translate a .docx and build a vocabulary table from its highlighted words",
    long_about = None
)]
struct Args {
    /// Generate default config, prompt files and template, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt/template files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Output .docx (default: vocabulary.docx next to the input)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Config file path (default: search for vocab-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat model name
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible API root
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Language to translate into (e.g. "Simplified Chinese")
    #[arg(long)]
    target_lang: Option<String>,

    /// Template .docx whose first table receives the vocabulary rows
    #[arg(long, value_name = "DOCX")]
    template: Option<PathBuf>,

    /// Use the template compiled into the binary instead of a file
    #[arg(long, conflicts_with = "template")]
    builtin_template: bool,

    /// Font family for generated text (empty string leaves the family unset)
    #[arg(long)]
    font_family: Option<String>,

    /// Font size in points for generated text
    #[arg(long, value_name = "PT")]
    font_size: Option<f32>,

    /// Reuse responses for identical prompts
    #[arg(long)]
    cache: bool,

    /// Persist cached responses in this directory (implies --cache)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Also write the parsed vocabulary as JSON
    #[arg(long, value_name = "JSON")]
    vocabulary_json: Option<PathBuf>,

    /// No progress lines on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  vocab-translator <input.docx> [-o vocabulary.docx]\n\nTIPS:\n  - Highlight words in the source document to get them glossed.\n  - Default config search: vocab-translator.toml (upwards), or set VOCAB_TRANSLATOR_CONFIG.\n  - The API key is read from OPENAI_API_KEY unless [completion].api_key_env says otherwise.\n"
            );
            return Ok(());
        }
    };

    let overrides = ConfigOverrides {
        model: args.model,
        base_url: args.base_url,
        target_lang: args.target_lang,
        template: args.template,
        font_family: args.font_family,
        font_size_pt: args.font_size,
        cache: args.cache.then_some(true),
        cache_dir: args.cache_dir,
    };
    let cfg = PipelineConfig::load(args.config, &overrides).context("build config")?;
    if let Some(p) = cfg.config_path.as_deref() {
        info!("config: {}", p.display());
    }

    let output = args
        .output
        .unwrap_or_else(|| input.with_file_name(&cfg.output_name));

    let openai = OpenAiClient::new(cfg.completion.clone()).context("build completion client")?;
    let client: Box<dyn CompletionClient> = if !cfg.cache_enabled {
        Box::new(openai)
    } else if let Some(dir) = cfg.cache_dir.clone() {
        info!("response cache: {}", dir.display());
        Box::new(CachedCompletion::with_dir(openai, dir)?)
    } else {
        Box::new(CachedCompletion::in_memory(openai))
    };

    let source = std::fs::read(&input).with_context(|| format!("read input: {}", input.display()))?;

    let mut pipeline = VocabularyPipeline::new(cfg, client, ConsoleProgress::new(!args.quiet));
    if args.builtin_template {
        pipeline = pipeline.with_template(TemplateSource::Builtin);
    }
    let out = pipeline.run(&source)?;

    std::fs::write(&output, &out.bytes)
        .with_context(|| format!("write output: {}", output.display()))?;
    info!("wrote {} ({}, {} bytes)", output.display(), out.mime, out.bytes.len());

    if let Some(path) = args.vocabulary_json {
        let json = serde_json::to_vec_pretty(&out.vocabulary).context("serialize vocabulary")?;
        std::fs::write(&path, json)
            .with_context(|| format!("write vocabulary json: {}", path.display()))?;
    }
    Ok(())
}
