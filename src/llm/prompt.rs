//! Prompt assembly: system rules, windowed history, documents and question.

use crate::models::{ChatMessage, MemoryTurn, ScoredChunk};

const SYSTEM_PROMPT: &str = "You are an AI assistant that answers questions based on provided documents.\n\
\n\
Instructions:\n\
1. Answer questions using ONLY the information from the provided documents\n\
2. If the answer is not in the documents, say \"I cannot find this information in the provided documents\"\n\
3. Use the conversation history to understand context and follow-up questions\n\
4. Be concise and accurate\n\
5. Cite specific document numbers when relevant [Document X]\n\
6. Handle pronouns and references based on conversation history (e.g., \"it\", \"that\", \"what you said\")";

/// Number each document with its relevance score and source.
pub fn format_context(docs: &[ScoredChunk]) -> String {
    if docs.is_empty() {
        return "(No relevant documents were found for this question.)\n".to_string();
    }

    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "[Document {}] (Relevance: {:.3})\n{}\nSource: {}, Page {}\n",
                i + 1,
                doc.score,
                doc.chunk.content,
                doc.chunk.metadata.filename,
                doc.chunk.metadata.page
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System message, then one user/assistant pair per history turn, then the
/// documents and the current question as the final user message.
pub fn build_messages(
    question: &str,
    docs: &[ScoredChunk],
    history: &[MemoryTurn],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));

    for turn in history {
        messages.push(ChatMessage::user(turn.query.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }

    let context = format_context(docs);
    messages.push(ChatMessage::user(format!(
        "Documents:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )));
    messages
}
