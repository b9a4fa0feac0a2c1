#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read configuration file: {0}")]
    ConfigOpen(#[from] std::io::Error),
    #[error("failed to parse configuration file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
    #[error("{0}")]
    Validation(String),
}
