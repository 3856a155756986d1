use thiserror::Error;

/// Errors produced while loading or rendering documents
#[derive(Error, Debug)]
pub enum TemplateError {
    /// A document path has no content in the source
    #[error("template {path} not found")]
    NotFound { path: String },

    #[error("read template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A document failed to parse
    #[error("parse template {name}: {message}")]
    Parse { name: String, message: String },

    /// A catalog fragment could not be loaded or attached
    #[error("add parse tree of {name} to base template: {message}")]
    Fragment { name: String, message: String },

    /// Rendering failed after every fragment was attached
    #[error("execute template {name} with data {data}: {message}")]
    Execute {
        name: String,
        data: String,
        message: String,
    },

    #[error("serialize template data: {0}")]
    Data(String),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
