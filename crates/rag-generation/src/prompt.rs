//! Prompt rendering.
//!
//! One fixed template: the retrieved context block, the running
//! conversation, and the current question, with an instruction to
//! answer in Swedish from the context.

use rag_types::ChatTurn;

const TEMPLATE: &str = "\
Answer the user's questions based primarily on the info in the context. \
If the answer is not in the context, see if you can find it elsewhere as \
long as it has to do with föreningar in sundsvall or similar. If the user \
asks for more information about a förening, see what you know about it, \
however try to use only information available to you, dont make it up if \
you dont know it. Please answer in Swedish.:
==============================
Context: {context}
==============================
Current conversation: {chat_history}

user: {question}
assistant:";

/// Render prior turns as "role: content" lines, oldest first.
pub fn format_history(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute context, history, and question into the template.
pub fn render_prompt(context: &str, history: &[ChatTurn], question: &str) -> String {
    TEMPLATE
        .replace("{context}", context)
        .replace("{chat_history}", &format_history(history))
        .replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_contains_all_sections() {
        let history = vec![
            ChatTurn::user("Hej!"),
            ChatTurn::assistant("Hej, vad kan jag hjälpa till med?"),
        ];
        let prompt = render_prompt("Klubb A ligger i Umeå.", &history, "Var ligger Klubb A?");

        assert!(prompt.contains("Context: Klubb A ligger i Umeå."));
        assert!(prompt.contains("user: Hej!"));
        assert!(prompt.contains("assistant: Hej, vad kan jag hjälpa till med?"));
        assert!(prompt.contains("user: Var ligger Klubb A?"));
        assert!(prompt.ends_with("assistant:"));
    }

    #[test]
    fn test_instructions_keep_forening_wording() {
        let prompt = render_prompt("", &[], "hej");
        assert!(prompt.starts_with("Answer the user's questions based primarily on the info"));
        assert!(prompt.contains(
            "see if you can find it elsewhere as long as it has to do with \
             föreningar in sundsvall or similar"
        ));
        assert!(prompt.contains("dont make it up if you dont know it"));
        assert!(prompt.contains("Please answer in Swedish.:"));
    }

    #[test]
    fn test_format_history_empty() {
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn test_format_history_order_is_oldest_first() {
        let history = vec![ChatTurn::user("first"), ChatTurn::assistant("second")];
        assert_eq!(format_history(&history), "user: first\nassistant: second");
    }
}
