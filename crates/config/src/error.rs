#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml_edit::TomlError),

    #[error("Failed to deserialize TOML: {0}")]
    Deserialize(#[from] toml_edit::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml_edit::ser::Error),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}
