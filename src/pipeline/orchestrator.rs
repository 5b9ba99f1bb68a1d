use std::path::PathBuf;

use log::{debug, error, info};

use crate::docx::reader::SourceDocument;
use crate::docx::template::{default_template_bytes, DOCX_MIME};
use crate::docx::writer::OutputDocument;
use crate::error::{DocumentError, PipelineError};
use crate::llm::CompletionClient;
use crate::progress::ConsoleProgress;
use crate::vocabulary::{parse_vocabulary, VocabularyEntry};

use super::PipelineConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Loaded,
    Translating,
    Translated,
    GlossingWords,
    Glossed,
    Assembling,
    Done,
    Failed,
}

/// Where the output document's template comes from.
#[derive(Clone, Debug)]
pub enum TemplateSource {
    File(PathBuf),
    Bytes(Vec<u8>),
    /// The template compiled into the crate.
    Builtin,
}

impl TemplateSource {
    fn open(&self) -> Result<OutputDocument, DocumentError> {
        match self {
            Self::File(path) => OutputDocument::open(path),
            Self::Bytes(bytes) => OutputDocument::from_bytes(bytes),
            Self::Builtin => {
                let bytes = default_template_bytes().map_err(DocumentError::Load)?;
                OutputDocument::from_bytes(&bytes)
            }
        }
    }
}

/// Result of a successful invocation: the finished document plus what went into it.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: &'static str,
    pub translation: String,
    pub vocabulary: Vec<VocabularyEntry>,
    pub paragraphs_added: usize,
}

/// Document in, vocabulary document out: read, translate, gloss highlighted terms, assemble.
pub struct VocabularyPipeline<C> {
    cfg: PipelineConfig,
    client: C,
    template: TemplateSource,
    progress: ConsoleProgress,
    stage: PipelineStage,
    failed_during: Option<PipelineStage>,
    history: Vec<PipelineStage>,
}

impl<C: CompletionClient> VocabularyPipeline<C> {
    pub fn new(cfg: PipelineConfig, client: C, progress: ConsoleProgress) -> Self {
        let template = TemplateSource::File(cfg.template_path.clone());
        Self {
            cfg,
            client,
            template,
            progress,
            stage: PipelineStage::Idle,
            failed_during: None,
            history: vec![PipelineStage::Idle],
        }
    }

    pub fn with_template(mut self, template: TemplateSource) -> Self {
        self.template = template;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Stage that was active when the last run failed.
    pub fn failed_during(&self) -> Option<PipelineStage> {
        self.failed_during
    }

    /// Stages entered by the last run, starting with `Idle`.
    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    /// Runs every stage in order. Any error aborts the run; no partial document is returned.
    pub fn run(&mut self, input: &[u8]) -> Result<PipelineOutput, PipelineError> {
        self.stage = PipelineStage::Idle;
        self.failed_during = None;
        self.history = vec![PipelineStage::Idle];

        match self.run_stages(input) {
            Ok(out) => Ok(out),
            Err(err) => {
                error!("pipeline failed during {:?}: {err}", self.stage);
                self.failed_during = Some(self.stage);
                self.enter(PipelineStage::Failed);
                self.progress.notice(format!("Failed: {err}"));
                Err(err)
            }
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        debug!("stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
        self.history.push(stage);
    }

    fn run_stages(&mut self, input: &[u8]) -> Result<PipelineOutput, PipelineError> {
        let source = SourceDocument::from_bytes(input).map_err(PipelineError::DocumentLoad)?;
        self.enter(PipelineStage::Loaded);
        let content = source.extract_content();
        info!(
            "loaded document: {} paragraphs, {} chars",
            source.paragraphs.len(),
            content.chars().count()
        );

        self.enter(PipelineStage::Translating);
        self.progress
            .notice(format!("Translating into {} ({})", self.cfg.target_lang, self.client.name()));
        let prompt = self.cfg.prompts.translation_prompt(&self.cfg.target_lang, &content);
        let translation = self.client.complete(&prompt)?;
        self.enter(PipelineStage::Translated);
        info!("translation received: {} chars", translation.chars().count());

        self.enter(PipelineStage::GlossingWords);
        let terms = source.extract_highlighted();
        let vocabulary = if terms.is_empty() {
            info!("no highlighted terms, skipping vocabulary request");
            Vec::new()
        } else {
            self.progress
                .notice(format!("Building vocabulary for {} highlighted terms", terms.len()));
            let prompt = self
                .cfg
                .prompts
                .vocabulary_prompt(&self.cfg.target_lang, &terms, &content);
            let response = self.client.complete(&prompt)?;
            parse_vocabulary(&response)?
        };
        self.enter(PipelineStage::Glossed);
        info!("vocabulary parsed: {} entries", vocabulary.len());

        self.enter(PipelineStage::Assembling);
        let mut doc = self.template.open().map_err(PipelineError::TemplateLoad)?;
        doc.append_vocabulary_table(&vocabulary, self.cfg.row_height_twips(), &self.cfg.run_format)?;
        let paragraphs_added = doc.append_content(&translation, &self.cfg.run_format);
        let bytes = doc.to_bytes().map_err(PipelineError::Serialize)?;
        self.enter(PipelineStage::Done);
        self.progress.notice(format!(
            "Done: {} vocabulary rows, {} paragraphs",
            vocabulary.len(),
            paragraphs_added
        ));

        Ok(PipelineOutput {
            bytes,
            file_name: self.cfg.output_name.clone(),
            mime: DOCX_MIME,
            translation,
            vocabulary,
            paragraphs_added,
        })
    }
}
