use thiserror::Error;

pub type OpsResult<T> = Result<T, OpsError>;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheet backend error: {0}")]
    Sheet(String),

    #[error("Sheet shape error: {0}")]
    Schema(String),

    #[error("Refusing write: edited table has {have} rows but the sheet has {need}; saving would delete rows")]
    WouldDeleteRows { have: usize, need: usize },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
