use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Style modifier applied to the rewrite instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Default,
    Professional,
    Casual,
    Seo,
    Friendly,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Default,
        Tone::Professional,
        Tone::Casual,
        Tone::Seo,
        Tone::Friendly,
    ];

    /// Unknown or empty names fall back to [`Tone::Default`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "professional" => Tone::Professional,
            "casual" => Tone::Casual,
            "seo" => Tone::Seo,
            "friendly" => Tone::Friendly,
            _ => Tone::Default,
        }
    }

    pub fn from_option(name: Option<&str>) -> Self {
        name.map(Self::from_name).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Default => "default",
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Seo => "seo",
            Tone::Friendly => "friendly",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(Tone::from_option(name.as_deref()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PromptRequest {
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PromptResponse {
    pub text: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct HumanizeRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub tone: Tone,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeResponse {
    pub text: String,
    pub words_left: i64,
    pub is_premium: bool,
    pub total_words_used: i64,
}
