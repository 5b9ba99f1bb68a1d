use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::PromptsSection;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_TRANSLATE_FILE: &str = "translate.txt";
pub const DEFAULT_VOCABULARY_FILE: &str = "vocabulary.txt";

pub const DEFAULT_TRANSLATE_TEXT: &str = r#"Translate the following text into {{target_lang}}.
Output only the translation. Do not add notes, explanations, headings or quotation marks.

{{text}}"#;

pub const DEFAULT_VOCABULARY_TEXT: &str = r#"For each word or phrase in the list below, give its pronunciation, part of speech and {{target_lang}} meaning as used in the article that follows.

Output exactly one line per word or phrase, in list order, in this format:
term | pronunciation | part of speech | translation

Rules:
- Wrap the pronunciation in slashes, e.g. /kæt/.
- For a multi-word phrase you may leave pronunciation and part of speech empty, but keep all three "|" separators, e.g.: look up | | | <translation>
- Output nothing else: no header, no numbering, no blank lines, no explanations.

Words and phrases:
{{terms}}

Article:
{{article}}"#;

/// The two prompt templates, with `{{name}}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptSet {
    pub translate: String,
    pub vocabulary: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            translate: DEFAULT_TRANSLATE_TEXT.to_string(),
            vocabulary: DEFAULT_VOCABULARY_TEXT.to_string(),
        }
    }
}

impl PromptSet {
    /// Built-in templates, replaced by any file the `[prompts]` section names. Relative
    /// paths resolve against `config_dir`.
    pub fn load(config_dir: &Path, section: &PromptsSection) -> anyhow::Result<Self> {
        let mut set = Self::default();
        if let Some(p) = section.translate.as_deref() {
            set.translate = read_prompt(config_dir, "translate", p)?;
        }
        if let Some(p) = section.vocabulary.as_deref() {
            set.vocabulary = read_prompt(config_dir, "vocabulary", p)?;
        }
        Ok(set)
    }

    pub fn translation_prompt(&self, target_lang: &str, text: &str) -> String {
        render_template(
            &self.translate,
            &[("target_lang", target_lang), ("text", text)],
        )
    }

    /// Terms are listed one per line, in the order given.
    pub fn vocabulary_prompt(&self, target_lang: &str, terms: &[String], article: &str) -> String {
        let terms = terms.join("\n");
        render_template(
            &self.vocabulary,
            &[
                ("target_lang", target_lang),
                ("terms", terms.as_str()),
                ("article", article),
            ],
        )
    }
}

fn read_prompt(config_dir: &Path, key: &str, path: &str) -> anyhow::Result<String> {
    let mut p = PathBuf::from(path.trim());
    if p.is_relative() {
        p = config_dir.join(&p);
    }
    if !p.exists() {
        return Err(anyhow!(
            "prompt file not found for {key}: {} (run: vocab-translator --init-config)",
            p.display()
        ));
    }
    std::fs::read_to_string(&p).with_context(|| format!("read prompt: {}", p.display()))
}

/// Replaces every `{{key}}` in one pass over `template`. Substituted values are copied in
/// verbatim and never rescanned; unknown keys are left as they are.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let value = after.find("}}").and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_TRANSLATE_FILE, DEFAULT_TRANSLATE_TEXT),
        (DEFAULT_VOCABULARY_FILE, DEFAULT_VOCABULARY_TEXT),
    ]
}

#[cfg(test)]
mod tests {
    use super::{render_template, PromptSet};
    use crate::config::PromptsSection;

    #[test]
    fn translation_prompt_embeds_text_and_language() {
        let p = PromptSet::default().translation_prompt("Simplified Chinese", "Hello world.");
        assert!(p.contains("into Simplified Chinese"));
        assert!(p.ends_with("\n\nHello world."));
        assert!(p.contains("Output only the translation"));
        assert!(!p.contains("{{"));
    }

    #[test]
    fn vocabulary_prompt_lists_terms_in_order_with_article() {
        let terms = vec!["world".to_string(), "look up".to_string(), "world".to_string()];
        let p = PromptSet::default().vocabulary_prompt("Simplified Chinese", &terms, "Hello world.");
        assert!(p.contains("Words and phrases:\nworld\nlook up\nworld\n\nArticle:\nHello world."));
        assert!(p.contains("term | pronunciation | part of speech | translation"));
        assert!(p.contains("/kæt/"));
        assert!(!p.contains("{{"));
    }

    #[test]
    fn prompts_are_deterministic() {
        let set = PromptSet::default();
        let terms = vec!["a".to_string()];
        assert_eq!(
            set.vocabulary_prompt("X", &terms, "b"),
            set.vocabulary_prompt("X", &terms, "b")
        );
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let terms = vec!["{{article}}".to_string()];
        let p = PromptSet::default().vocabulary_prompt("{{text}}", &terms, "SECRET ARTICLE");
        assert!(p.contains("Words and phrases:\n{{article}}\n\nArticle:\nSECRET ARTICLE"));
        assert!(p.contains("give its pronunciation, part of speech and {{text}} meaning"));
        assert_eq!(p.matches("SECRET ARTICLE").count(), 1);
    }

    #[test]
    fn default_vocabulary_example_is_language_neutral() {
        let p = PromptSet::default().vocabulary_prompt("German", &["x".to_string()], "y");
        assert!(p.contains("look up | | | <translation>"));
        assert!(!p.contains("查阅"));
    }

    #[test]
    fn unterminated_and_unknown_placeholders_pass_through() {
        assert_eq!(render_template("{{a}} {{ {{zz}}", &[("a", "1")]), "1 {{ {{zz}}");
        assert_eq!(render_template("x {{a", &[("a", "1")]), "x {{a");
    }

    #[test]
    fn render_replaces_every_occurrence() {
        assert_eq!(render_template("{{a}}-{{a}}-{{b}}", &[("a", "1")]), "1-1-{{b}}");
    }

    #[test]
    fn overrides_resolve_relative_to_config_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("prompts")).expect("mkdir");
        std::fs::write(dir.path().join("prompts/t.txt"), "T {{text}}").expect("write");
        let section = PromptsSection {
            translate: Some("prompts/t.txt".to_string()),
            vocabulary: None,
        };
        let set = PromptSet::load(dir.path(), &section).expect("load");
        assert_eq!(set.translation_prompt("x", "body"), "T body");
        assert_eq!(set.vocabulary, PromptSet::default().vocabulary);
    }

    #[test]
    fn missing_override_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let section = PromptsSection {
            translate: None,
            vocabulary: Some("nope.txt".to_string()),
        };
        let err = PromptSet::load(dir.path(), &section).unwrap_err();
        assert!(err.to_string().contains("prompt file not found for vocabulary"));
    }
}
