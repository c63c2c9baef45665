use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from terminal or session-file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid configuration (bad base URL, missing project id, ...).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport or HTTP status failure talking to the server.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON shape we expect.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A tree page decoded but failed validation.
    #[error("Invalid tree page: {0}")]
    InvalidPage(String),

    /// A directory listing could not be loaded. The tree store is unchanged.
    #[error("Failed to load '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: Box<AppError>,
    },

    /// A search request failed.
    #[error("Search for '{query}' failed: {source}")]
    Search {
        query: String,
        #[source]
        source: Box<AppError>,
    },

    /// The live event stream dropped or could not be opened.
    #[error("Event stream error: {0}")]
    Stream(String),

    /// A live event frame could not be parsed.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

impl AppError {
    /// Wrap an error as a directory load failure for `path`.
    pub fn load(path: &str, source: AppError) -> Self {
        AppError::Load {
            path: path.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap an error as a search failure for `query`.
    pub fn search(query: &str, source: AppError) -> Self {
        AppError::Search {
            query: query.to_string(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn terminal_error_display() {
        let err = AppError::Terminal("failed to enter raw mode".into());
        assert_eq!(err.to_string(), "Terminal error: failed to enter raw mode");
    }

    #[test]
    fn decode_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Decode(_)));
    }

    #[test]
    fn load_error_names_path_and_cause() {
        let err = AppError::load("docs/guides", AppError::InvalidPage("duplicate path".into()));
        assert_eq!(
            err.to_string(),
            "Failed to load 'docs/guides': Invalid tree page: duplicate path"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn search_error_names_query() {
        let err = AppError::search("readme", AppError::Stream("closed".into()));
        assert!(err.to_string().starts_with("Search for 'readme' failed"));
    }
}
