mod config;
mod orchestrator;
pub mod prompts;

pub use config::{
    init_default_config, ConfigOverrides, PipelineConfig, DEFAULT_OUTPUT_NAME,
    DEFAULT_TARGET_LANG, DEFAULT_TEMPLATE_PATH,
};
pub use orchestrator::{PipelineOutput, PipelineStage, TemplateSource, VocabularyPipeline};
