use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::{Message, Role};
use crate::token_counter::TokenCounter;

/// Session statistics, a pure projection over the retained log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
    pub avg_user_message_chars: f64,
    pub avg_assistant_message_chars: f64,
    pub session_start: DateTime<Utc>,
    pub session_duration_seconds: f64,
}

impl SessionStats {
    pub fn compute(messages: &[Message], session_start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let mut user_messages = 0usize;
        let mut assistant_messages = 0usize;
        let mut user_chars = 0usize;
        let mut assistant_chars = 0usize;

        for msg in messages {
            let chars = msg.char_count();
            match msg.role {
                Role::User => {
                    user_messages += 1;
                    user_chars += chars;
                }
                Role::Assistant => {
                    assistant_messages += 1;
                    assistant_chars += chars;
                }
            }
        }

        let duration = (now - session_start).num_milliseconds().max(0) as f64 / 1000.0;

        Self {
            total_messages: messages.len(),
            user_messages,
            assistant_messages,
            total_characters: user_chars + assistant_chars,
            estimated_tokens: TokenCounter::count_messages(messages),
            avg_user_message_chars: average(user_chars, user_messages),
            avg_assistant_message_chars: average(assistant_chars, assistant_messages),
            session_start,
            session_duration_seconds: duration,
        }
    }
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
