// src/llm.rs
//
// Multiple-choice question generation from extracted course material,
// backed by the Groq chat-completions API with a mock fallback. The
// outcome of each call travels back to the caller as an explicit
// diagnostic value instead of module state, so the upload handler can
// tell the instructor which source produced the questions.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Prompt material is truncated to keep request sizes bounded.
const MATERIAL_LIMIT: usize = 12_000;

/// Diagnostic messages are clipped so transport errors never leak
/// oversized bodies (or secrets embedded in them) to the client.
const DIAGNOSTIC_LIMIT: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedItem {
    pub text: String,
    pub choices: Vec<String>,
}

/// Where a generation run's questions came from, and why the fallback was
/// used if it was.
#[derive(Debug, Clone, Serialize)]
pub struct LlmDiagnostic {
    /// "groq" or "mock".
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generates up to `max_questions` multiple-choice items from the given
/// material. Falls back to the mock set when no API key is configured,
/// when the model's output is unusable, or on transport errors; the
/// returned diagnostic says which happened.
pub async fn generate_questions(
    config: &Config,
    text: &str,
    max_questions: usize,
) -> (Vec<GeneratedItem>, LlmDiagnostic) {
    let Some(api_key) = config.groq_api_key.as_deref() else {
        return (
            mock_questions(max_questions),
            LlmDiagnostic {
                source: "mock",
                error: Some("Missing GROQ_API_KEY".to_string()),
            },
        );
    };

    match call_groq(api_key, &config.groq_model, text, max_questions).await {
        Ok(items) if !items.is_empty() => (
            items,
            LlmDiagnostic {
                source: "groq",
                error: None,
            },
        ),
        Ok(_) => (
            mock_questions(max_questions),
            LlmDiagnostic {
                source: "mock",
                error: Some("Empty or unparseable model output".to_string()),
            },
        ),
        Err(message) => {
            tracing::warn!(
                "Question generation failed, falling back to mock set: {}",
                message
            );
            let clipped: String = message.chars().take(DIAGNOSTIC_LIMIT).collect();
            (
                mock_questions(max_questions),
                LlmDiagnostic {
                    source: "mock",
                    error: Some(clipped),
                },
            )
        }
    }
}

async fn call_groq(
    api_key: &str,
    model: &str,
    text: &str,
    max_questions: usize,
) -> Result<Vec<GeneratedItem>, String> {
    let material: String = text.chars().take(MATERIAL_LIMIT).collect();

    let body = serde_json::json!({
        "model": model,
        "temperature": 0.2,
        "max_tokens": 1200,
        "messages": [
            {
                "role": "system",
                "content": "You generate clear, concise multiple-choice questions from \
                            provided teaching materials. Only output valid JSON as \
                            requested; do not include prose or markdown."
            },
            {
                "role": "user",
                "content": format!(
                    "From the material below, write up to {} multiple-choice questions.\n\
                     Each item must be a JSON object with keys: text (string), choices \
                     (array of exactly 4 strings).\n\
                     Return a single JSON array only. No explanations.\n\n\
                     MATERIAL:\n{}",
                    max_questions, material
                )
            }
        ]
    });

    let response = reqwest::Client::new()
        .post(GROQ_API_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?
        .error_for_status()
        .map_err(|e| e.to_string())?;

    let payload: Value = response.json().await.map_err(|e| e.to_string())?;
    let content = payload["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default();

    let items = match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => items,
        _ => extract_json_array(content)
            .and_then(|array| serde_json::from_str::<Vec<Value>>(&array).ok())
            .unwrap_or_default(),
    };

    Ok(normalize_items(&items, max_questions))
}

/// Salvages the first JSON array out of model output that wrapped it in
/// prose or code fences.
fn extract_json_array(content: &str) -> Option<String> {
    let re = Regex::new(r"(?s)\[.*\]").ok()?;
    re.find(content).map(|m| m.as_str().to_string())
}

/// Accepts the key spellings models actually produce and trims the
/// results down to well-formed items.
fn normalize_items(items: &[Value], max_questions: usize) -> Vec<GeneratedItem> {
    let mut out = Vec::new();
    for item in items {
        let text = ["text", "question", "prompt"]
            .iter()
            .find_map(|key| item[*key].as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let choices = ["choices", "options"]
            .iter()
            .find_map(|key| item[*key].as_array());

        if let (Some(text), Some(choices)) = (text, choices) {
            let choices: Vec<String> = choices
                .iter()
                .filter_map(|choice| choice.as_str())
                .map(|choice| choice.trim().to_string())
                .take(4)
                .collect();
            out.push(GeneratedItem {
                text: text.to_string(),
                choices,
            });
            if out.len() == max_questions {
                break;
            }
        }
    }
    out
}

/// Fallback items used when no API key is configured or the API call
/// fails. Enough to drive the review workflow in development.
fn mock_questions(max_questions: usize) -> Vec<GeneratedItem> {
    let mut items = vec![
        GeneratedItem {
            text: "Which statement best describes formative assessment?".to_string(),
            choices: vec![
                "An evaluation at the end of a course to assign grades".to_string(),
                "A process to monitor learning and give feedback during instruction".to_string(),
                "A standardized test administered annually".to_string(),
                "An accreditation requirement for institutions".to_string(),
            ],
        },
        GeneratedItem {
            text: "In a multiple-choice question, what is the distractor?".to_string(),
            choices: vec![
                "The correct answer".to_string(),
                "Any incorrect option intended to mislead".to_string(),
                "The question stem".to_string(),
                "The explanation after submission".to_string(),
            ],
        },
    ];
    items.truncate(max_questions);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_array_from_fenced_output() {
        let content = "Here you go:\n```json\n[{\"text\": \"Q\"}]\n```";
        let array = extract_json_array(content).unwrap();
        assert!(array.starts_with('['));
        assert!(array.ends_with(']'));
    }

    #[test]
    fn normalize_accepts_alternate_key_spellings() {
        let items = vec![
            serde_json::json!({"question": " What? ", "options": ["a", "b", "c", "d", "e"]}),
            serde_json::json!({"text": "", "choices": ["a", "b"]}),
            serde_json::json!({"no_text": true}),
        ];

        let normalized = normalize_items(&items, 6);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].text, "What?");
        // A fifth option is dropped.
        assert_eq!(normalized[0].choices.len(), 4);
    }

    #[test]
    fn normalize_caps_the_item_count() {
        let items: Vec<Value> = (0..10)
            .map(|i| serde_json::json!({"text": format!("Q{}", i), "choices": ["a", "b"]}))
            .collect();
        assert_eq!(normalize_items(&items, 6).len(), 6);
    }

    #[test]
    fn mock_set_respects_the_requested_maximum() {
        assert_eq!(mock_questions(1).len(), 1);
        assert_eq!(mock_questions(6).len(), 2);
    }
}
