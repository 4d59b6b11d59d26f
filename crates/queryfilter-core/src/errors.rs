use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("serialize failed: {0}")]
    Serialize(serde_json::Error),
    #[error("search params must be a map, got {0}")]
    NotAMap(&'static str),
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ParamsError>;
