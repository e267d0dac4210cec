use policy_core::error::AppError;

/// Returned when nothing relevant was retrieved, and demanded of the model when the
/// context does not contain the answer.
pub const NO_ANSWER: &str = "I don't know based on the provided documents.";

/// Demanded of the model for questions about earlier turns.
pub const HISTORY_REFUSAL: &str = "I can only answer factual questions based on the provided policy documents. This system does not retain or reference past interactions.";

/// Demanded of the model for requests for opinions, feedback or rewording.
pub const OPINION_REFUSAL: &str =
    "I can only answer factual questions based on the provided policy documents.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInput<'a> {
    pub context: &'a str,
    pub question: &'a str,
}

/// Fill the fixed answering template. The context must carry text; the question is
/// inserted exactly as asked.
pub fn render_prompt(input: &PromptInput<'_>) -> Result<String, AppError> {
    let context = input.context.trim();
    let question = input.question;
    if context.is_empty() {
        return Err(AppError::new(
            "VALIDATION_PROMPT_INPUT",
            "Prompt context must not be empty",
        ));
    }

    Ok(format!(
        r#"
You are a strict question-answering system for company policy documents.

Behavior Rules (must be followed exactly):
1. Use ONLY the provided context to answer questions.
2. Do NOT add opinions, suggestions, paraphrases, explanations, or conversational text.
3. Do NOT reference previous questions, previous answers, or conversation history.
4. If the question refers to past interactions, memory, prior questions, or prior answers:
   Respond ONLY with:
   "{HISTORY_REFUSAL}"
   Do not add anything else.
5. If the question asks for opinions, feelings, paraphrasing, feedback, or rewording:
   Respond ONLY with:
   "{OPINION_REFUSAL}"
   Do not add anything else.
6. If the answer is not explicitly present in the context:
   Respond ONLY with:
   "{NO_ANSWER}"
   Do not add anything else.

Context:
{context}

Question:
{question}

Answer Instructions:
- Provide ONLY the direct factual answer.
- Do NOT include disclaimers, rule explanations, or system behavior text.
- If listing policies, list ONLY policy document names.
- Limit answers to 1–2 concise sentences.
"#
    ))
}
