use crate::services::model_client::ModelErrorKind;
use serde::Serialize;

const TIPS: &str = "In the meantime, consider:\n\
- Reviewing your career goals and skills\n\
- Preparing questions about your career path\n\
- Researching industry trends in your field";

/// Why a canned reply replaced the model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Blocked,
    ConnectionFailure,
    Generic,
    /// Model answered with nothing usable
    EmptyResponse,
}

impl FallbackReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Blocked => "blocked",
            Self::ConnectionFailure => "connection_failure",
            Self::Generic => "generic",
            Self::EmptyResponse => "empty_response",
        }
    }

    fn lead(&self) -> &'static str {
        match self {
            Self::Blocked => {
                "I can't respond to that request as phrased. Could you rephrase your question \
                 with a focus on your career goals?"
            }
            Self::ConnectionFailure => {
                "I'm experiencing technical difficulties connecting to the AI service. \
                 Please try again in a moment."
            }
            Self::Generic => "Something went wrong while generating a response. Please try again.",
            Self::EmptyResponse => {
                "I wasn't able to put together a useful answer this time. \
                 Could you add a bit more detail about your situation?"
            }
        }
    }
}

impl From<ModelErrorKind> for FallbackReason {
    fn from(kind: ModelErrorKind) -> Self {
        match kind {
            ModelErrorKind::Blocked => Self::Blocked,
            ModelErrorKind::ConnectionFailure => Self::ConnectionFailure,
            ModelErrorKind::Generic => Self::Generic,
        }
    }
}

pub fn fallback_response(reason: FallbackReason) -> String {
    format!("{}\n\n{}", reason.lead(), TIPS)
}
