pub mod package;
pub mod reader;
pub mod template;
pub mod writer;
pub mod xml;
