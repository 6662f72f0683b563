//! OpenAI-compatible chat-completions collaborators.
//!
//! - [`OpenAiVqaModel`]: image + numbered questions in, numbered answers out
//! - [`OpenAiRater`]: strict JSON-schema verdict `{"score": bool}`
//! - [`OpenAiClient::cluster_by_creativity`]: asks the model to sort questions
//!   into five creativity clusters
//!
//! Transport failures map to [`CallError::Network`], unusable responses to
//! [`CallError::Parse`]. Nothing here retries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::collaborators::{CallError, CallResult, ImageData, Rater, VqaModel, NOT_AVAILABLE};
use crate::types::Temperature;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Creativity cluster names, in prompt order.
pub const CREATIVITY_CLUSTERS: [&str; 5] = [
    "Binary_Factual_Questions",
    "Identification_Questions",
    "Classification_Questions",
    "Analytical_Questions",
    "Creative_Subjective_Questions",
];

const VQA_INSTRUCTION: &str =
    "Please answer the following questions about the image in a numbered list format, one answer per question.";

const RATER_PROMPT: &str = r#"You are an AI assistant designed to evaluate the correctness of a predicted answer compared to a golden answer for a given question.
Your task is to determine if the predicted answer is semantically equivalent or sufficiently similar to the golden answer to be considered correct.
Respond with a JSON object containing a single key 'score' with a boolean value: true if the predicted answer is correct (semantically equivalent or very close to the golden answer), and false if it is incorrect.
Do not provide any other text or explanation.

Question: {question}
Golden Answer: {golden_answer}
Predicted Answer: {predicted_answer}"#;

const CREATIVITY_PROMPT: &str = r#"You are an AI assistant tasked with clustering questions based on their creativity and complexity level.
Create exactly 5 clusters that represent different levels of creativity and complexity:

1. Binary_Factual_Questions: Simple yes/no questions about specific categories or facts
2. Identification_Questions: Questions asking to identify specific information (author, title, etc.)
3. Classification_Questions: Questions asking about type or genre with some interpretation needed
4. Analytical_Questions: Questions requiring more nuanced understanding and analysis
5. Creative_Subjective_Questions: Open-ended questions requiring creative thinking or subjective judgment

Analyze each question and assign it to the most appropriate cluster based on:
- How much creativity is required to answer
- Whether it's binary (yes/no) vs open-ended
- Level of interpretation and analysis needed
- Factual vs subjective nature

Return a JSON object with exactly these 5 cluster names as keys. Each key should have an array of questions as its value.
Make sure each question appears in exactly one cluster.

Questions to cluster:
"#;

/// Numbered list item: "3. answer" or "3) answer".
static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*[.)]\s*(.*?)\s*$").expect("valid numbered-line regex"));

/// Shared HTTP client for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// POST a chat-completions request and return the first message content.
    async fn chat(&self, body: &Value) -> CallResult<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Network(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CallError::Network(format!(
                "{} returned {}: {}",
                url,
                status,
                text.chars().take(300).collect::<String>()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CallError::Parse(format!("response body is not JSON: {}", e)))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CallError::Parse("response has no message content".to_string()))
    }

    /// Sort questions into the five [`CREATIVITY_CLUSTERS`].
    pub async fn cluster_by_creativity(
        &self,
        model: &str,
        questions: &[&str],
    ) -> CallResult<BTreeMap<String, Vec<String>>> {
        let body = creativity_request(model, questions);
        let content = self.chat(&body).await?;
        parse_creativity(&content)
    }
}

/// Model under test, answering numbered questions about an image.
#[derive(Debug, Clone)]
pub struct OpenAiVqaModel {
    client: OpenAiClient,
    model: String,
    max_tokens: u32,
}

impl OpenAiVqaModel {
    pub fn new(client: OpenAiClient, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl VqaModel for OpenAiVqaModel {
    async fn query(
        &self,
        image: &ImageData,
        questions: &[String],
        temperature: Temperature,
    ) -> CallResult<Vec<String>> {
        let body = vqa_request(&self.model, image, questions, temperature, self.max_tokens);
        let content = self.client.chat(&body).await?;

        let answers = parse_numbered_answers(&content, questions.len());
        if answers.is_empty() && !questions.is_empty() {
            return Err(CallError::Parse(format!(
                "no numbered answers in response: {}",
                content.chars().take(200).collect::<String>()
            )));
        }
        if answers.len() < questions.len() {
            tracing::debug!(
                "Parsed {} of {} answers from VQA response",
                answers.len(),
                questions.len()
            );
        }
        Ok(answers)
    }
}

/// Judge comparing predicted answers against golden ones.
#[derive(Debug, Clone)]
pub struct OpenAiRater {
    client: OpenAiClient,
    model: String,
}

impl OpenAiRater {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Rater for OpenAiRater {
    async fn rate(&self, question: &str, golden_answer: &str, predicted_answer: &str) -> CallResult<bool> {
        let body = rating_request(&self.model, question, golden_answer, predicted_answer);
        let content = self.client.chat(&body).await?;
        parse_score(&content)
    }
}

fn vqa_request(
    model: &str,
    image: &ImageData,
    questions: &[String],
    temperature: Temperature,
    max_tokens: u32,
) -> Value {
    let data_url = format!("data:{};base64,{}", image.mime, BASE64.encode(&image.bytes));

    let mut content = vec![
        json!({"type": "text", "text": VQA_INSTRUCTION}),
        json!({"type": "image_url", "image_url": {"url": data_url}}),
    ];
    for (i, question) in questions.iter().enumerate() {
        content.push(json!({"type": "text", "text": format!("{}. {}", i + 1, question)}));
    }

    json!({
        "model": model,
        "messages": [{"role": "user", "content": content}],
        "temperature": temperature.as_f64(),
        "max_tokens": max_tokens,
    })
}

fn rating_request(model: &str, question: &str, golden_answer: &str, predicted_answer: &str) -> Value {
    let prompt = RATER_PROMPT
        .replace("{question}", question)
        .replace("{golden_answer}", golden_answer)
        .replace("{predicted_answer}", predicted_answer);

    json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "score_response",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {"score": {"type": "boolean"}},
                    "required": ["score"],
                    "additionalProperties": false
                }
            }
        }
    })
}

fn creativity_request(model: &str, questions: &[&str]) -> Value {
    let mut prompt = CREATIVITY_PROMPT.to_string();
    for (i, question) in questions.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, question));
    }

    let properties: serde_json::Map<String, Value> = CREATIVITY_CLUSTERS
        .iter()
        .map(|name| (name.to_string(), json!({"type": "array", "items": {"type": "string"}})))
        .collect();

    json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "question_clusters",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": properties,
                    "required": CREATIVITY_CLUSTERS,
                    "additionalProperties": false
                }
            }
        },
        "temperature": 0.3,
        "max_tokens": 2000,
    })
}

/// Extract numbered answers `1..=expected`, each placed by its own number.
///
/// The numbering itself is stripped. Skipped items and items with no text
/// become [`NOT_AVAILABLE`]; trailing ones are dropped so unanswered
/// questions at the end stay unmatched. Lines numbered outside the range
/// are ignored, and a repeated number keeps its first answer.
pub fn parse_numbered_answers(content: &str, expected: usize) -> Vec<String> {
    let mut slots: Vec<Option<String>> = vec![None; expected];

    for line in content.lines() {
        let Some(caps) = NUMBERED_LINE.captures(line) else {
            continue;
        };
        let Ok(number) = caps[1].parse::<usize>() else {
            continue;
        };
        if number == 0 || number > expected {
            continue;
        }
        let slot = &mut slots[number - 1];
        if slot.is_none() {
            let answer = caps[2].trim();
            *slot = Some(if answer.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                answer.to_string()
            });
        }
    }

    let answered = slots
        .iter()
        .rposition(|slot| matches!(slot, Some(answer) if answer != NOT_AVAILABLE))
        .map_or(0, |last| last + 1);
    slots.truncate(answered);
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| NOT_AVAILABLE.to_string()))
        .collect()
}

/// Pull the first JSON object out of a model response.
fn extract_json(content: &str) -> Option<Value> {
    serde_json::from_str(content.trim()).ok().or_else(|| {
        let start = content.find('{')?;
        let end = content.rfind('}')?;
        serde_json::from_str(&content[start..=end]).ok()
    })
}

fn parse_score(content: &str) -> CallResult<bool> {
    let parsed = extract_json(content)
        .ok_or_else(|| CallError::Parse(format!("rater response is not JSON: {}", content)))?;
    parsed
        .get("score")
        .and_then(Value::as_bool)
        .ok_or_else(|| CallError::Rate(format!("rater response has no boolean score: {}", content)))
}

fn parse_creativity(content: &str) -> CallResult<BTreeMap<String, Vec<String>>> {
    let parsed = extract_json(content)
        .ok_or_else(|| CallError::Parse("creativity response is not JSON".to_string()))?;

    let mut clusters = BTreeMap::new();
    for name in CREATIVITY_CLUSTERS {
        let questions = parsed
            .get(name)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        clusters.insert(name.to_string(), questions);
    }
    Ok(clusters)
}
