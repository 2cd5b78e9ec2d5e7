//! Prompt construction
//!
//! Turns an action type plus the client-supplied context (book memory,
//! library snapshot, chat history) into the provider prompt. Pure
//! templating; the interesting decisions live in the metering gate.

use bookshelf_shared::ActionType;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_BASE: &str = "You are the writing assistant of a personal book catalogue. \
Ground every answer in the reader's own notes and the stored book memory. \
Answer in the reader's language.";

pub fn build_prompt(action: ActionType, context: &Value) -> Prompt {
    let book = describe_book(context);
    let memory = context["memory"]
        .as_str()
        .or_else(|| context["book"]["memory"].as_str())
        .unwrap_or("");

    let user = match action {
        ActionType::Script => format!(
            "Write a short-form video script based on {}.\nBook memory:\n{}",
            book, memory
        ),
        ActionType::Ideas => format!(
            "List content ideas a reader could produce from {}.\nBook memory:\n{}",
            book, memory
        ),
        ActionType::Quotes => format!(
            "Select the most shareable quotes from {} with one line of context each.\nBook memory:\n{}",
            book, memory
        ),
        ActionType::Questions => format!(
            "Write discussion questions for {} suited to a reading group.\nBook memory:\n{}",
            book, memory
        ),
        ActionType::Chat => {
            let history = render_history(context);
            format!(
                "Continue this conversation about {}.\nBook memory:\n{}\n\nConversation so far:\n{}",
                book, memory, history
            )
        }
        ActionType::EditorialLine => format!(
            "Propose an editorial line (tone, themes, angle) for content built on {}.\nBook memory:\n{}",
            book, memory
        ),
        ActionType::CrossReference => {
            let library = render_library(context);
            format!(
                "Find connections, shared themes and contrasts across these books:\n{}",
                library
            )
        }
    };

    Prompt {
        system: SYSTEM_BASE.to_string(),
        user,
    }
}

fn describe_book(context: &Value) -> String {
    let title = context["book"]["title"]
        .as_str()
        .or_else(|| context["title"].as_str())
        .unwrap_or("the selected book");
    let author = context["book"]["author"]
        .as_str()
        .or_else(|| context["author"].as_str());

    match author {
        Some(author) => format!("\"{}\" by {}", title, author),
        None => format!("\"{}\"", title),
    }
}

fn render_history(context: &Value) -> String {
    context["history"]
        .as_array()
        .map(|turns| {
            turns
                .iter()
                .filter_map(|turn| {
                    let role = turn["role"].as_str()?;
                    let content = turn["content"].as_str()?;
                    Some(format!("{}: {}", role, content))
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn render_library(context: &Value) -> String {
    context["library"]
        .as_array()
        .map(|books| {
            books
                .iter()
                .filter_map(|book| {
                    let title = book["title"].as_str()?;
                    let memory = book["memory"].as_str().unwrap_or("");
                    Some(format!("- {}: {}", title, memory))
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| "(no library provided)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_script_prompt_includes_book_and_memory() {
        let context = json!({
            "book": { "title": "Meditations", "author": "Marcus Aurelius", "memory": "Stoic reflections on duty." }
        });
        let prompt = build_prompt(ActionType::Script, &context);
        assert!(prompt.user.contains("\"Meditations\" by Marcus Aurelius"));
        assert!(prompt.user.contains("Stoic reflections on duty."));
        assert!(prompt.user.contains("video script"));
    }

    #[test]
    fn test_missing_book_falls_back() {
        let prompt = build_prompt(ActionType::Ideas, &json!({}));
        assert!(prompt.user.contains("the selected book"));
    }

    #[test]
    fn test_chat_prompt_renders_history() {
        let context = json!({
            "book": { "title": "Dune" },
            "history": [
                { "role": "user", "content": "Who is Paul?" },
                { "role": "assistant", "content": "The heir of House Atreides." }
            ]
        });
        let prompt = build_prompt(ActionType::Chat, &context);
        assert!(prompt.user.contains("user: Who is Paul?"));
        assert!(prompt.user.contains("assistant: The heir of House Atreides."));
    }

    #[test]
    fn test_cross_reference_uses_library_not_single_book() {
        let context = json!({
            "library": [
                { "title": "Dune", "memory": "Desert politics." },
                { "title": "Foundation", "memory": "Fall of empires." }
            ]
        });
        let prompt = build_prompt(ActionType::CrossReference, &context);
        assert!(prompt.user.contains("- Dune: Desert politics."));
        assert!(prompt.user.contains("- Foundation: Fall of empires."));
    }
}
