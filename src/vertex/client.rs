//! Gemini inference via the Vertex AI `generateContent` REST API.
//!
//! The REST API is stateless, so the session history is kept client-side in
//! [`ChatSession`] and replayed on every call.

use crate::config::DeepspecConfig;
use crate::tools::ToolDefinition;
use crate::types::FunctionCall;
use crate::vertex::session::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shown when project or location is missing.
pub const MISSING_CONFIG_MESSAGE: &str = "Vertex AI configuration missing. Please set GOOGLE_CLOUD_PROJECT and GCP_LOCATION environment variables.";

/// Vertex AI client for one model.
#[derive(Debug, Clone)]
pub struct VertexClient {
    project_id: String,
    location: String,
    model: String,
    access_token: String,
    tools: Vec<ToolDefinition>,
    http: reqwest::Client,
}

// -- generateContent request/response types ---------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<&'a Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolPayload<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolPayload<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

/// Response parts may carry extra keys (e.g. thought signatures), so they
/// are read field-by-field rather than as a tagged enum.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought: bool,
}

impl VertexClient {
    /// Create a client from config, declaring `tools` on every session.
    pub fn new(config: &DeepspecConfig, tools: Vec<ToolDefinition>) -> Result<Self, BackendError> {
        if !config.has_backend() {
            return Err(BackendError::Config(MISSING_CONFIG_MESSAGE.into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            project_id: config.gcp_project_id.clone(),
            location: config.gcp_location.clone(),
            model: config.model_name.clone(),
            access_token: config.access_token.clone(),
            tools,
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `generateContent` URL for the configured model.
    fn endpoint(&self) -> String {
        let host = if self.location == "global" {
            "aiplatform.googleapis.com".to_string()
        } else {
            format!("{}-aiplatform.googleapis.com", self.location)
        };
        format!(
            "https://{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            host, self.project_id, self.location, self.model
        )
    }
}

#[async_trait]
impl ChatBackend for VertexClient {
    async fn start_session(&self) -> Result<ChatSession, BackendError> {
        let session = ChatSession::new(&self.model, self.tools.clone());
        debug!("Started chat session {} on {}", session.id, session.model);
        Ok(session)
    }

    async fn send(
        &self,
        session: &mut ChatSession,
        parts: Vec<Part>,
    ) -> Result<ModelResponse, BackendError> {
        let turn = Content::user(parts);

        let mut contents: Vec<&Content> = session.history.iter().collect();
        contents.push(&turn);

        let request = GenerateContentRequest {
            contents,
            tools: tool_payloads(&session.tools),
        };

        debug!(
            "generateContent on {} ({} turns of history)",
            session.model,
            session.history.len()
        );

        let mut req = self.http.post(self.endpoint()).json(&request);
        if !self.access_token.is_empty() {
            req = req.bearer_auth(&self.access_token);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = resp.json().await?;
        let response = into_model_response(body)?;

        session.record(turn, response.content.clone());
        Ok(response)
    }
}

fn tool_payloads(tools: &[ToolDefinition]) -> Vec<ToolPayload<'_>> {
    if tools.is_empty() {
        return Vec::new();
    }
    vec![ToolPayload {
        function_declarations: tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: &t.name,
                description: &t.description,
                parameters: to_vertex_schema(&t.parameters),
            })
            .collect(),
    }]
}

/// Vertex schemas spell types in upper case (`OBJECT`, `STRING`, ...).
fn to_vertex_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let v = match (k.as_str(), v) {
                    ("type", serde_json::Value::String(t)) => {
                        serde_json::Value::String(t.to_uppercase())
                    }
                    _ => to_vertex_schema(v),
                };
                (k.clone(), v)
            })
            .collect(),
        serde_json::Value::Array(items) => items.iter().map(to_vertex_schema).collect(),
        other => other.clone(),
    }
}

fn into_model_response(body: GenerateContentResponse) -> Result<ModelResponse, BackendError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or(BackendError::EmptyResponse)?;

    let parts = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| match (p.function_call, p.text) {
            (Some(call), _) => Some(Part::FunctionCall(call)),
            (None, Some(text)) if !p.thought => Some(Part::Text(text)),
            _ => None,
        })
        .collect::<Vec<_>>();

    // Blocked or thought-only candidates carry nothing to record.
    if parts.is_empty() {
        return Err(BackendError::EmptyResponse);
    }
    Ok(ModelResponse::new(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::internal_registry;
    use serde_json::json;

    fn config(location: &str) -> DeepspecConfig {
        DeepspecConfig {
            gcp_project_id: "demo".into(),
            gcp_location: location.into(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_project_is_config_error() {
        let err = VertexClient::new(&DeepspecConfig::default(), Vec::new()).unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));
        assert_eq!(err.to_string(), MISSING_CONFIG_MESSAGE);
    }

    #[test]
    fn endpoint_uses_regional_host() {
        let client = VertexClient::new(&config("us-central1"), Vec::new()).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1/publishers/google/models/gemini-2.5-flash-lite:generateContent"
        );

        let client = VertexClient::new(&config("global"), Vec::new()).unwrap();
        assert!(client.endpoint().starts_with("https://aiplatform.googleapis.com/"));
    }

    #[test]
    fn echo_declaration_is_uppercased() {
        let defs = internal_registry().definitions();
        let payloads = tool_payloads(&defs);
        let value = serde_json::to_value(&payloads).unwrap();
        let decl = &value[0]["functionDeclarations"][0];
        assert_eq!(decl["name"], "echo");
        assert_eq!(decl["parameters"]["type"], "OBJECT");
        assert_eq!(decl["parameters"]["properties"]["text"]["type"], "STRING");
        assert_eq!(decl["parameters"]["required"], json!(["text"]));
    }

    #[test]
    fn parses_function_calls_and_skips_thoughts() {
        let body: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking...", "thought": true},
                        {"functionCall": {"name": "echo", "args": {"text": "hello"}},
                         "thoughtSignature": "abc"},
                        {"text": "calling echo"}
                    ]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let response = into_model_response(body).unwrap();
        assert_eq!(response.text(), "calling echo");
        let calls = response.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "echo");
        assert_eq!(calls[0].args["text"], "hello");
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let body: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            into_model_response(body),
            Err(BackendError::EmptyResponse)
        ));
    }

    #[test]
    fn blocked_candidate_is_empty_response() {
        for body in [
            json!({"candidates": [{"finishReason": "SAFETY"}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": []}}]}),
            json!({"candidates": [{"content": {"parts": [{"text": "hmm", "thought": true}]}}]}),
        ] {
            let body: GenerateContentResponse = serde_json::from_value(body).unwrap();
            assert!(matches!(
                into_model_response(body),
                Err(BackendError::EmptyResponse)
            ));
        }
    }

    #[tokio::test]
    async fn sessions_declare_tools() {
        let client =
            VertexClient::new(&config("us-central1"), internal_registry().definitions()).unwrap();
        let session = client.start_session().await.unwrap();
        assert_eq!(session.tools.len(), 1);
        assert!(session.history.is_empty());
        assert_eq!(session.model, "gemini-2.5-flash-lite");
    }
}
