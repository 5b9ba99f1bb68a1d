pub mod config;
pub mod docx;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod vocabulary;
