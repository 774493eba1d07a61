//! Conversational query request building and response parsing.
//!
//! The HTTP call itself lives in [`crate::gemini`]; everything here is
//! pure so the schema branch and the fallback parsing are unit-testable
//! without a provider.
//!
//! Two response-handling branches exist, selected by model naming
//! convention (not a capability probe):
//! - `gemini-2*` models return free text — the reply becomes the answer
//!   with no sources.
//! - Newer models are asked for strict JSON (`answer` + `sources`); if
//!   the reply still fails to parse, the raw text becomes the answer
//!   rather than failing the turn.

use serde_json::{json, Value};

use crate::models::{Answer, ChatMessage};

/// Default retrieval-grounded answering instruction.
///
/// References the document preamble produced by [`crate::transform`]:
/// changing either side requires changing both.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a knowledge base search assistant.\n\n\
Your task:\n\
1. Summarize the information from the documents in your own words. Avoid direct long quotes.\n\
2. Provide a clear answer to the user's question\n\
3. Extract the URL from the frontmatter of each document used (line 'url: ...')\n\
4. Return a list of sources with URLs and page titles\n\n\
Rules:\n\
- Answer briefly in your own words based on the provided data\n\
- Use only information from the found documents\n\
- If there's no information, say so\n\
- Add to sources only the pages you actually used for the answer\n\
- Do not use markdown in response, change it to html\n\
- URL is taken from the document's frontmatter (---\\nurl: ...\\n---)\n\
- Title is taken from H1 in the document\n\n";

/// Built-in selectable models. The head of the list is the default;
/// `[provider].extra_models` extends it.
pub const MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-3-flash-preview",
    "gemini-3-pro-preview",
];

pub fn model_list(extra: &[String]) -> Vec<String> {
    let mut models: Vec<String> = MODELS.iter().map(|m| m.to_string()).collect();
    models.extend(extra.iter().cloned());
    models
}

/// Legacy models don't support strict output schemas.
pub fn is_legacy_model(model: &str) -> bool {
    model.starts_with("gemini-2")
}

/// Build the `generateContent` request body: system instruction, the full
/// turn sequence, a `file_search` tool referencing the store, and — for
/// schema-capable models — the strict answer/sources output schema.
pub fn build_generate_body(
    messages: &[ChatMessage],
    store_name: &str,
    model: &str,
    system_instruction: Option<&str>,
) -> Value {
    let instruction = system_instruction.unwrap_or(DEFAULT_SYSTEM_INSTRUCTION);

    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| {
            json!({
                "role": m.role,
                "parts": [{ "text": m.content }]
            })
        })
        .collect();

    let mut body = json!({
        "system_instruction": {
            "parts": [{ "text": instruction }]
        },
        "contents": contents,
        "tools": [{
            "file_search": {
                "file_search_store_names": [store_name]
            }
        }]
    });

    if !is_legacy_model(model) {
        body["generationConfig"] = json!({
            "temperature": 0.3,
            "responseMimeType": "application/json",
            "responseJsonSchema": answer_schema(),
        });
    }

    body
}

fn answer_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "answer": {
                "type": "string",
                "description": "Answer to the user question in HTML format do not use markdown"
            },
            "sources": {
                "type": "array",
                "description": "List of sources used for the answer",
                "items": {
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Page URL" },
                        "title": { "type": "string", "description": "Page title" }
                    },
                    "required": ["url", "title"]
                }
            }
        },
        "required": ["answer", "sources"]
    })
}

/// Normalize the model's reply text into an [`Answer`].
///
/// Structured parsing is attempted only for schema-capable models, and a
/// parse failure falls back to text-only — a schema mismatch never fails
/// the turn.
pub fn parse_answer(reply_text: &str, model: &str) -> Answer {
    if is_legacy_model(model) {
        return Answer::text_only(reply_text);
    }

    match serde_json::from_str::<Answer>(reply_text) {
        Ok(answer) => answer,
        Err(_) => Answer::text_only(reply_text),
    }
}
