//! Hand-off to the brochure generation stage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::corpus::CorpusAggregate;

/// Writing style requested from the generation stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Technical,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Technical => "technical",
        })
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "technical" => Ok(Tone::Technical),
            other => Err(format!("unknown tone: {other}")),
        }
    }
}

/// Consumer of an acquired corpus. Reads the corpus, never mutates it.
#[async_trait]
pub trait GenerationStage: Send + Sync {
    async fn generate(
        &self,
        corpus: &CorpusAggregate,
        tone: Tone,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}
