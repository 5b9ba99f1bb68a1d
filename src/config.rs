use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "vocab-translator.toml";
pub const CONFIG_ENV_VAR: &str = "VOCAB_TRANSLATOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Language the document is translated into and glossed in.
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub completion: CompletionSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub document: DocumentSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CompletionSection {
    #[serde(default)]
    pub model: Option<String>,
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable that holds the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CacheSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Persist responses here. Relative to the config file directory.
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DocumentSection {
    /// Template `.docx` whose first table receives the vocabulary rows.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_size_pt: Option<f32>,
    #[serde(default)]
    pub row_height_cm: Option<f32>,
    #[serde(default)]
    pub output_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub translate: Option<String>,
    #[serde(default)]
    pub vocabulary: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

/// Working directory first, then the executable's directory.
pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    let exe = std::env::current_exe().ok()?;
    find_file_upwards(exe.parent()?, filename, 10)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// Absolute paths are kept; relative ones are tried against each base in turn, and the first
/// existing candidate wins. With no existing candidate the path is joined to the first base.
pub fn resolve_relative(path: &str, bases: &[PathBuf]) -> PathBuf {
    let p = PathBuf::from(path.trim());
    if p.is_absolute() {
        return p;
    }
    bases
        .iter()
        .map(|b| b.join(&p))
        .find(|cand| cand.exists())
        .or_else(|| bases.first().map(|b| b.join(&p)))
        .unwrap_or(p)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{find_file_upwards, load_config, resolve_relative, AppConfig};

    #[test]
    fn parses_all_sections() {
        let cfg: AppConfig = toml::from_str(
            r#"
target_lang = "Japanese"

[completion]
model = "gpt-4o"
base_url = "http://localhost:11434/v1"
api_key_env = "LOCAL_KEY"
temperature = 0.2
timeout_secs = 30

[cache]
enabled = true
dir = ".cache"

[document]
template = "assets/t.docx"
font_family = "Arial"
font_size_pt = 11.5
row_height_cm = 1.0
output_name = "out.docx"

[prompts]
translate = "prompts/translate.txt"
"#,
        )
        .expect("toml");
        assert_eq!(cfg.target_lang.as_deref(), Some("Japanese"));
        assert_eq!(cfg.completion.model.as_deref(), Some("gpt-4o"));
        assert_eq!(cfg.completion.timeout_secs, Some(30));
        assert_eq!(cfg.cache.enabled, Some(true));
        assert_eq!(cfg.document.font_size_pt, Some(11.5));
        assert_eq!(cfg.prompts.translate.as_deref(), Some("prompts/translate.txt"));
        assert!(cfg.prompts.vocabulary.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.completion.model.is_none());
        assert!(cfg.document.template.is_none());
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(toml::from_str::<AppConfig>("[document]\nfont_size_pt = \"big\"").is_err());
    }

    #[test]
    fn finds_file_in_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join("x.toml"), "").expect("write");
        assert_eq!(
            find_file_upwards(&nested, "x.toml", 4),
            Some(dir.path().join("x.toml"))
        );
        assert_eq!(find_file_upwards(&nested, "x.toml", 1), None);
    }

    #[test]
    fn relative_paths_prefer_existing_candidate() {
        let a = tempfile::tempdir().expect("a");
        let b = tempfile::tempdir().expect("b");
        std::fs::write(b.path().join("t.docx"), "x").expect("write");
        let bases = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        assert_eq!(resolve_relative("t.docx", &bases), b.path().join("t.docx"));
        assert_eq!(resolve_relative("none.docx", &bases), a.path().join("none.docx"));
        assert_eq!(resolve_relative("x", &[]), PathBuf::from("x"));
    }
}
