use thiserror::Error;

/// Header row of an uploaded file does not match the import template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMismatch {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl HeaderMismatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl std::fmt::Display for HeaderMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "missing columns [{}], unexpected columns [{}]",
            self.missing.join(", "),
            self.unexpected.join(", ")
        )
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("import file headers do not match the template: {0}")]
    Headers(HeaderMismatch),

    #[error("failed to flush CSV output: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
