use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{
    find_default_config, load_config, resolve_relative, AppConfig, CONFIG_ENV_VAR,
    CONFIG_FILE_NAME,
};
use crate::docx::template::write_default_template;
use crate::docx::writer::RunFormat;
use crate::llm::OpenAiConfig;
use crate::pipeline::prompts::{default_prompt_files, PromptSet, DEFAULT_PROMPTS_DIR};

pub const DEFAULT_TARGET_LANG: &str = "Simplified Chinese";
pub const DEFAULT_TEMPLATE_PATH: &str = "assets/vocabulary_template.docx";
pub const DEFAULT_FONT_FAMILY: &str = "Times New Roman";
pub const DEFAULT_FONT_SIZE_PT: f32 = 12.0;
pub const DEFAULT_ROW_HEIGHT_CM: f32 = 0.8;
pub const DEFAULT_OUTPUT_NAME: &str = "vocabulary.docx";

const TWIPS_PER_CM: f32 = 1440.0 / 2.54;

/// Command-line values that take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub target_lang: Option<String>,
    pub template: Option<PathBuf>,
    pub font_family: Option<String>,
    pub font_size_pt: Option<f32>,
    pub cache: Option<bool>,
    pub cache_dir: Option<PathBuf>,
}

/// Everything one pipeline invocation needs, fully resolved.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,
    pub target_lang: String,
    pub completion: OpenAiConfig,
    pub cache_enabled: bool,
    /// `None` keeps cached responses in memory only.
    pub cache_dir: Option<PathBuf>,
    pub template_path: PathBuf,
    pub run_format: RunFormat,
    pub row_height_cm: f32,
    pub output_name: String,
    pub prompts: PromptSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            target_lang: DEFAULT_TARGET_LANG.to_string(),
            completion: OpenAiConfig::default(),
            cache_enabled: false,
            cache_dir: None,
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            run_format: RunFormat {
                font_family: Some(DEFAULT_FONT_FAMILY.to_string()),
                font_size_pt: DEFAULT_FONT_SIZE_PT,
            },
            row_height_cm: DEFAULT_ROW_HEIGHT_CM,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            prompts: PromptSet::default(),
        }
    }
}

impl PipelineConfig {
    pub fn row_height_twips(&self) -> u32 {
        (self.row_height_cm.max(0.0) * TWIPS_PER_CM).round() as u32
    }

    /// Config file from `config_path`, `$VOCAB_TRANSLATOR_CONFIG`, or an upward search;
    /// a missing file means built-in defaults.
    pub fn load(config_path: Option<PathBuf>, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(CONFIG_FILE_NAME));

        let mut file_cfg = AppConfig::default();
        let mut used_path = None;
        if let Some(p) = cfg_file {
            if p.exists() {
                file_cfg = load_config(&p)?;
                used_path = Some(p);
            }
        }
        Self::from_app_config(file_cfg, used_path, overrides)
    }

    pub fn from_app_config(
        file_cfg: AppConfig,
        config_path: Option<PathBuf>,
        overrides: &ConfigOverrides,
    ) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut bases = vec![config_dir.clone()];
        if let Ok(cwd) = std::env::current_dir() {
            bases.push(cwd);
        }
        if let Some(dir) = std::env::current_exe().ok().and_then(|e| e.parent().map(Path::to_path_buf)) {
            bases.push(dir);
        }

        let target_lang = non_empty(overrides.target_lang.clone())
            .or_else(|| non_empty(file_cfg.target_lang.clone()))
            .unwrap_or(defaults.target_lang);

        let c = &file_cfg.completion;
        let completion = OpenAiConfig {
            model: non_empty(overrides.model.clone())
                .or_else(|| non_empty(c.model.clone()))
                .unwrap_or(defaults.completion.model),
            base_url: non_empty(overrides.base_url.clone())
                .or_else(|| non_empty(c.base_url.clone()))
                .unwrap_or(defaults.completion.base_url),
            api_key_env: non_empty(c.api_key_env.clone()).unwrap_or(defaults.completion.api_key_env),
            temperature: c.temperature,
            timeout_secs: c.timeout_secs.unwrap_or(defaults.completion.timeout_secs).max(1),
        };

        let cache_enabled = overrides
            .cache
            .or(file_cfg.cache.enabled)
            .unwrap_or(defaults.cache_enabled)
            || overrides.cache_dir.is_some();
        let cache_dir = overrides.cache_dir.clone().or_else(|| {
            non_empty(file_cfg.cache.dir.clone()).map(|d| {
                let p = PathBuf::from(d);
                if p.is_relative() {
                    config_dir.join(p)
                } else {
                    p
                }
            })
        });

        let d = &file_cfg.document;
        let template_path = match overrides.template.clone() {
            Some(p) => p,
            None => {
                let rel = non_empty(d.template.clone())
                    .unwrap_or_else(|| DEFAULT_TEMPLATE_PATH.to_string());
                resolve_relative(&rel, &bases)
            }
        };

        let font_family = match overrides.font_family.as_deref() {
            Some(f) => non_empty(Some(f.to_string())),
            None => match d.font_family.as_deref() {
                Some(f) => non_empty(Some(f.to_string())),
                None => defaults.run_format.font_family,
            },
        };
        let font_size_pt = overrides
            .font_size_pt
            .or(d.font_size_pt)
            .filter(|s| *s > 0.0)
            .unwrap_or(DEFAULT_FONT_SIZE_PT);

        let prompts = PromptSet::load(&config_dir, &file_cfg.prompts).context("load prompts")?;

        Ok(Self {
            config_path,
            target_lang,
            completion,
            cache_enabled,
            cache_dir,
            template_path,
            run_format: RunFormat {
                font_family,
                font_size_pt,
            },
            row_height_cm: d.row_height_cm.filter(|h| *h > 0.0).unwrap_or(DEFAULT_ROW_HEIGHT_CM),
            output_name: non_empty(d.output_name.clone()).unwrap_or(defaults.output_name),
            prompts,
        })
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Writes the default config, prompt files and vocabulary template into `dir`. Existing
/// files are kept unless `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;
    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    write_default_template(&dir.join(DEFAULT_TEMPLATE_PATH), force)?;

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"# Language used for the translated body and the vocabulary meanings.
target_lang = "Simplified Chinese"

[completion]
# Any OpenAI-compatible chat-completions endpoint.
model = "gpt-4o-mini"
base_url = "https://api.openai.com/v1"
# The key itself is never stored here; it is read from this environment variable.
api_key_env = "OPENAI_API_KEY"
timeout_secs = 300
# temperature = 0.3

[cache]
# Reuse responses for identical prompts.
enabled = false
# dir = ".vocab-cache"

[document]
template = "assets/vocabulary_template.docx"
font_family = "Times New Roman"
font_size_pt = 12
row_height_cm = 0.8
output_name = "vocabulary.docx"

[prompts]
translate = "prompts/translate.txt"
vocabulary = "prompts/vocabulary.txt"
"#;
