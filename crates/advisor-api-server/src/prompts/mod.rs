mod system_prompt;

pub use system_prompt::{GuidanceContext, SystemPrompt};
