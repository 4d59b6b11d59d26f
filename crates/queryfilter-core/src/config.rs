use serde::{Deserialize, Serialize};

pub const DEFAULT_DEPTH: usize = 5;
pub const DEFAULT_ARRAY_LIMIT: usize = 20;
pub const DEFAULT_PARAMETER_LIMIT: usize = 1000;

/// Limits applied while decoding a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QsOptions {
    /// Bracket segments nested below the root key; anything deeper is kept as
    /// one literal key.
    pub depth: usize,
    /// Highest `[n]` index still read as an array position.
    pub array_limit: usize,
    pub parameter_limit: usize,
}

impl Default for QsOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            array_limit: DEFAULT_ARRAY_LIMIT,
            parameter_limit: DEFAULT_PARAMETER_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_options_fill_defaults() {
        let opts: QsOptions = serde_json::from_str(r#"{"depth": 2}"#).unwrap();
        assert_eq!(opts.depth, 2);
        assert_eq!(opts.array_limit, DEFAULT_ARRAY_LIMIT);
        assert_eq!(opts.parameter_limit, DEFAULT_PARAMETER_LIMIT);
    }
}
