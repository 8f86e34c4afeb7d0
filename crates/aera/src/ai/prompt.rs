//! Prompt construction.

use super::ChatTurn;
use crate::conversation::MessageRole;

/// System instructions used when the caller does not supply any.
///
/// `pre_prompt` is the user's own addition and sits between the persona and
/// the general guidance.
pub fn default_system_prompt(user_name: &str, pre_prompt: &str) -> String {
    let mut prompt = format!(
        "You are Aera, a friendly and knowledgeable AI assistant. The user's name is {}.",
        user_name.trim()
    );

    let pre_prompt = pre_prompt.trim();
    if !pre_prompt.is_empty() {
        prompt.push(' ');
        prompt.push_str(pre_prompt);
    }

    prompt.push_str(
        " Answer questions clearly and concisely. If the user's request is unclear, \
         ask clarifying questions. Stay focused on what the user asks.",
    );
    prompt
}

/// Render turns as the line-per-message transcript local models expect.
pub fn history_text(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                MessageRole::User => "Human",
                MessageRole::Assistant => "AI",
                MessageRole::System => "System",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
