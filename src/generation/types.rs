//! Gemini `generateContent` wire types

use serde::{Deserialize, Serialize};

use crate::core::{GenerationOptions, Prompt, Role};
use crate::gemini::{ApiError, Content};

/// Request body for `generateContent` / `streamGenerateContent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfigWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfigWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerateContentRequest {
    /// Empty turns are dropped, as are assistant turns ahead of the first user
    /// turn (the UI opens with a greeting); Gemini rejects empty text parts and
    /// expects `contents` to open with a user turn.
    pub fn new(prompt: &Prompt, options: &GenerationOptions) -> Self {
        let contents = prompt
            .turns
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .skip_while(|m| m.role != Role::User)
            .map(|m| Content::text(Some(wire_role(m.role)), m.content.clone()))
            .collect();

        let system_instruction =
            (!prompt.system.is_empty()).then(|| Content::text(None, prompt.system.clone()));

        let generation_config = (options.temperature.is_some()
            || options.max_output_tokens.is_some())
        .then(|| GenerationConfigWire {
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
        });

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// One response, or one SSE frame of a streamed response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate; empty when the frame carries none
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(Content::joined_text)
            .unwrap_or_default()
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    /// Finish reason of the first candidate, if this frame ends the answer
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }

    /// Finish reason when the answer was cut off by anything other than a
    /// natural stop or the output token limit
    pub fn stopped_early(&self) -> Option<&str> {
        self.finish_reason()
            .filter(|reason| !matches!(*reason, "STOP" | "MAX_TOKENS"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Message;

    #[test]
    fn test_request_shape() {
        let prompt = Prompt {
            system: "You are helpful.".into(),
            turns: vec![
                Message::user("Hi"),
                Message::assistant("Hello"),
                Message::user("Who teaches calculus?"),
            ],
        };
        let options = GenerationOptions {
            temperature: Some(0.2),
            max_output_tokens: None,
        };

        let json = serde_json::to_value(GenerateContentRequest::new(&prompt, &options)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are helpful.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "Who teaches calculus?");
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_no_generation_config_when_unset() {
        let prompt = Prompt {
            system: String::new(),
            turns: vec![Message::user("Hi")],
        };
        let json = serde_json::to_value(GenerateContentRequest::new(
            &prompt,
            &GenerationOptions::default(),
        ))
        .unwrap();
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_response_text() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Dr. "}, {"text": "Smith"}]},
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), "Dr. Smith");
        assert_eq!(response.finish_reason(), Some("STOP"));
        assert!(response.stopped_early().is_none());
    }

    #[test]
    fn test_stopped_early() {
        let safety: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(safety.stopped_early(), Some("SAFETY"));

        let capped: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).unwrap();
        assert_eq!(capped.stopped_early(), None);

        let running: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Dr."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(running.stopped_early(), None);
    }

    #[test]
    fn test_leading_greeting_and_empty_turns_dropped() {
        let prompt = Prompt {
            system: String::new(),
            turns: vec![
                Message::assistant("Hi! Ask me about any professor."),
                Message::user("Who teaches calculus?"),
                Message::assistant(""),
                Message::user("And physics?"),
            ],
        };
        let json = serde_json::to_value(GenerateContentRequest::new(
            &prompt,
            &GenerationOptions::default(),
        ))
        .unwrap();
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["parts"][0]["text"], "And physics?");
    }
}
