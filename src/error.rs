use thiserror::Error;

/// Failures while opening or serializing a `.docx` package.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("not a readable docx document: {0:#}")]
    Load(anyhow::Error),

    #[error("could not serialize docx document: {0:#}")]
    Write(anyhow::Error),
}

/// Failures of the text-generation call. None of these are retried.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("missing API credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("completion request failed: {0}")]
    Request(String),

    #[error("completion service rejected credentials ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("completion rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("completion service responded with error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse completion response: {0}")]
    Parse(String),

    #[error("completion service returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CompletionError::Parse(e.to_string())
        } else {
            CompletionError::Request(e.to_string())
        }
    }
}

/// A vocabulary response line that does not split into exactly four `|` fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vocabulary line {line_number} has {fields} field(s), expected 4: {line:?}")]
pub struct VocabularyParseError {
    /// 1-based, counted after the whole response is trimmed.
    pub line_number: usize,
    pub line: String,
    pub fields: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateShapeError {
    #[error("template document contains no table")]
    NoTable,

    #[error("template table has {found} column(s), at least 4 are required")]
    TooFewColumns { found: usize },
}

/// Everything that can abort a pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load input document: {0}")]
    DocumentLoad(#[source] DocumentError),

    #[error("failed to load template document: {0}")]
    TemplateLoad(#[source] DocumentError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    VocabularyParse(#[from] VocabularyParseError),

    #[error(transparent)]
    TemplateShape(#[from] TemplateShapeError),

    #[error("failed to serialize output document: {0}")]
    Serialize(#[source] DocumentError),
}
