//! Prompt assembly for the chat model.

use sage_index::TokenCounter;
use sage_types::ChatTurn;

/// Fixed tutor persona for the chat model.
pub const SYSTEM_PROMPT: &str = "\
You are an AI assistant specialized in machine learning, deep learning, and data science. \
You provide helpful, accurate, and educational responses to questions about these topics.

When answering a query:
1. Provide clear explanations with appropriate technical detail for the complexity of the question.
2. When explaining concepts, include practical examples to illustrate how they work.
3. When relevant, mention advantages, limitations, and common use cases.
4. Break down your explanation into understandable components.
5. Maintain a professional and educational tone throughout your responses.
6. Prioritize information from the context documents and enhance them with your knowledge.
7. Keep your answers concise and to the point.
8. If you don't know the answer, say so.
9. Do not include unnecessary information or repetitive explanations.
10. Format your response clearly and directly address the question.

CONVERSATIONAL GUIDELINES:
- When the user refers to previous questions or answers, use the provided conversation history to maintain context.
- If the user asks a follow-up question about something previously discussed, reference that information in your response.
- Remember details the user has shared about their project or needs throughout the conversation.";

/// Appended to the system prompt for non-English queries; the reply gets
/// translated afterwards.
pub const RESPOND_IN_ENGLISH_NOTE: &str =
    "\n\nPlease respond in English. The response will be translated later.";

/// Only the most recent turns are replayed (three user/assistant pairs).
pub const HISTORY_WINDOW: usize = 6;

/// Assemble the user prompt: context documents, recent history, question.
///
/// The result is trimmed to `max_input_tokens`: oldest history turns go
/// first, then context documents from the least relevant end. The question
/// itself is never dropped.
#[must_use]
pub fn build_prompt(
    context: &[String],
    history: &[ChatTurn],
    question: &str,
    counter: &TokenCounter,
    max_input_tokens: u32,
) -> String {
    let mut context: Vec<&String> = context.iter().collect();
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut history: Vec<&ChatTurn> = history[start..].iter().collect();

    loop {
        let prompt = assemble(&context, &history, question);
        if counter.count_str(&prompt) <= max_input_tokens {
            return prompt;
        }
        if !history.is_empty() {
            history.remove(0);
        } else if !context.is_empty() {
            context.pop();
        } else {
            return prompt;
        }
    }
}

fn assemble(context: &[&String], history: &[&ChatTurn], question: &str) -> String {
    let mut prompt = String::new();

    for (i, text) in context.iter().enumerate() {
        prompt.push_str(&format!("DOCUMENT {}:\n{}\n\n", i + 1, text));
    }

    if history.is_empty() {
        prompt.push_str(&format!("QUESTION:\n{question}"));
    } else {
        prompt.push_str("PREVIOUS CONVERSATION:\n");
        for turn in history {
            prompt.push_str(&format!(
                "{}: {}\n\n",
                turn.role.prompt_label(),
                turn.content
            ));
        }
        prompt.push_str(&format!("CURRENT QUESTION:\n{question}"));
    }

    prompt
}
