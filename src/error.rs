use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("webdriver session could not be established at {url}: {message}")]
    Connect { url: String, message: String },

    #[error("browser command failed: {0}")]
    Browser(String),

    #[error("expected page element missing: {0}")]
    MissingElement(String),

    #[error("login form did not go stale after submit: {0}")]
    LoginStuck(String),

    #[error("could not read total sample count from {0:?}")]
    TotalCount(String),

    #[error("record frame has no sequence block")]
    MissingSequence,

    #[error("record row {0} has no name cell")]
    MissingName(usize),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl HarvestError {
    pub fn browser(err: thirtyfour::error::WebDriverError) -> Self {
        HarvestError::Browser(err.to_string())
    }

    pub fn filesystem(err: std::io::Error) -> Self {
        HarvestError::Filesystem(err.to_string())
    }
}
