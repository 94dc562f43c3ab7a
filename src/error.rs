use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The package opened but is not a usable WordprocessingML document.
    #[error("Invalid DOCX: {0}")]
    InvalidDocx(String),

    /// A required object (input document, template) is not in storage.
    #[error("Missing required object: {0}")]
    MissingObject(String),

    #[error("Correction failed: {0}")]
    Correction(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event rule error: {0}")]
    EventRule(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
