use serde::{Deserialize, Serialize};

use crate::models::{Tone, UserQuota};

pub const AUTH_REQUIRED_MESSAGE: &str = "Please sign in to Chrome to use this extension";
pub const API_ERROR_MESSAGE: &str = "Failed to humanize text. Please try again.";

/// Requests a UI surface sends to the background orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BackgroundRequest {
    EnhancePrompt {
        prompt: String,
        #[serde(default)]
        tone: Tone,
    },
    GetUserData,
    RefreshUserData,
}

/// Fire-and-forget notifications pushed to a page or the popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ForegroundEvent {
    StartHumanizing,
    CopyToClipboard { text: String },
    HumanizationFailed { text: String },
    FillText { text: String },
    #[serde(rename_all = "camelCase")]
    WordsUpdated { words_left: i64 },
    AuthRequired,
    InsufficientWords { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthRequired,
    InsufficientWords,
    ApiError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackgroundResponse {
    Enhanced { result: String },
    Failed { error: ErrorCode, message: String },
    UserData { user: Option<UserQuota> },
}

impl BackgroundResponse {
    pub fn failed(error: ErrorCode, message: impl Into<String>) -> Self {
        BackgroundResponse::Failed {
            error,
            message: message.into(),
        }
    }
}
