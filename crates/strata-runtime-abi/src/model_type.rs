use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Closed set of architectures the runtime knows how to drive.
/// The backend for one of these is chosen once, at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Gpt2,
    GptJ,
    GptNeoX,
    DollyV2,
    Replit,
    StarCoder,
    Mpt,
    Falcon,
    Llama,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown model type '{0}'")]
pub struct ParseModelTypeError(pub String);

impl ModelType {
    pub const ALL: [ModelType; 9] = [
        ModelType::Gpt2,
        ModelType::GptJ,
        ModelType::GptNeoX,
        ModelType::DollyV2,
        ModelType::Replit,
        ModelType::StarCoder,
        ModelType::Mpt,
        ModelType::Falcon,
        ModelType::Llama,
    ];

    /// Canonical identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Gpt2 => "gpt2",
            ModelType::GptJ => "gptj",
            ModelType::GptNeoX => "gpt_neox",
            ModelType::DollyV2 => "dolly-v2",
            ModelType::Replit => "replit",
            ModelType::StarCoder => "starcoder",
            ModelType::Mpt => "mpt",
            ModelType::Falcon => "falcon",
            ModelType::Llama => "llama",
        }
    }

    /// Decoded text that signals completion for architectures which end a
    /// response with a marker instead of the end-of-text id. Only consulted
    /// when the vocabulary carries special tokens.
    pub fn end_marker(self) -> Option<&'static str> {
        match self {
            ModelType::DollyV2 => Some("### End"),
            ModelType::Gpt2
            | ModelType::GptJ
            | ModelType::GptNeoX
            | ModelType::Replit
            | ModelType::StarCoder
            | ModelType::Mpt
            | ModelType::Falcon
            | ModelType::Llama => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ParseModelTypeError;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        let ty = match key.as_str() {
            "gpt2" => ModelType::Gpt2,
            "gptj" | "gpt_j" => ModelType::GptJ,
            "gpt_neox" | "gptneox" => ModelType::GptNeoX,
            "dolly_v2" => ModelType::DollyV2,
            "replit" => ModelType::Replit,
            "starcoder" | "gpt_bigcode" => ModelType::StarCoder,
            "mpt" => ModelType::Mpt,
            "falcon" => ModelType::Falcon,
            "llama" => ModelType::Llama,
            _ => return Err(ParseModelTypeError(s.to_string())),
        };
        Ok(ty)
    }
}
