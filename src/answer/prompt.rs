use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, ChatRole};
use crate::store::SourceDocument;

pub const NO_CONTEXT_ANSWER: &str = "I'm sorry, I couldn't find any relevant information in the document. Please try rephrasing your question.";

const SYSTEM: &str = "You are a helpful AI assistant that answers questions based on the provided context from PDF documents.";

const INSTRUCTIONS: &str = "Instructions:
1. Use ONLY the information from the context above to answer the question
2. If you can't find relevant information in the context, say so
3. Be specific and cite information directly from the context
4. If asked for key points or takeaways, structure your response in bullet points";

/// A prior exchange supplied by the caller; nothing is kept server-side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnswerFormat {
    #[default]
    Plain,
    /// Non-empty answer lines as an HTML list under a summary heading
    Html,
}

pub fn context_block(docs: &[SourceDocument]) -> String {
    docs.iter().map(|d| d.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

/// System message, then history, then the context/question message.
pub fn build_messages(question: &str, docs: &[SourceDocument], history: &[ChatTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM));
    messages.extend(history.iter().map(|t| ChatMessage::new(t.role, t.content.clone())));
    messages.push(ChatMessage::user(format!(
        "Context: {}\n\nQuestion: {}\n\n{}\n\nAnswer: ",
        context_block(docs),
        question.trim(),
        INSTRUCTIONS
    )));
    messages
}

pub fn format_answer(answer: &str, format: AnswerFormat) -> String {
    match format {
        AnswerFormat::Plain => answer.trim().to_string(),
        AnswerFormat::Html => {
            let mut out = String::from("<h3>Summary of the Document:</h3><ul>");
            for line in answer.lines().map(str::trim).filter(|l| !l.is_empty()) {
                out.push_str("<li>");
                out.push_str(line);
                out.push_str("</li>");
            }
            out.push_str("</ul>");
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn doc(text: &str) -> SourceDocument {
        SourceDocument { id: Uuid::nil(), source: "a.pdf".into(), chunk_index: 0, text: text.into(), distance: 0.1 }
    }

    #[test]
    fn messages_wrap_history_between_system_and_question() {
        let history = vec![
            ChatTurn { role: ChatRole::User, content: "Who wrote it?".into() },
            ChatTurn { role: ChatRole::Assistant, content: "Ada.".into() },
        ];
        let msgs = build_messages(" When? ", &[doc("first part"), doc("second part")], &history);
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].role, ChatRole::System);
        assert_eq!(msgs[1].content, "Who wrote it?");
        assert_eq!(msgs[2].role, ChatRole::Assistant);
        let last = &msgs[3].content;
        assert!(last.starts_with("Context: first part\n\nsecond part\n\nQuestion: When?\n\n"));
        assert!(last.contains("Use ONLY the information"));
        assert!(last.ends_with("Answer: "));
    }

    #[test]
    fn html_format_lists_non_empty_lines() {
        let html = format_answer("Point one\n\n  Point two  \n", AnswerFormat::Html);
        assert_eq!(html, "<h3>Summary of the Document:</h3><ul><li>Point one</li><li>Point two</li></ul>");
        assert_eq!(format_answer("  plain \n", AnswerFormat::Plain), "plain");
    }

    #[test]
    fn chat_turns_deserialize_lowercase_roles() {
        let turn: ChatTurn = serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(turn.role, ChatRole::Assistant);
    }
}
