//! Analysis engine backed by an OpenAI-compatible chat completions API.

use crate::config::AnalysisConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tripwire_core::{AnalysisEngine, AnalysisVerdict, Result, TripwireError, SUMMARY_ERROR};

const SUMMARY_MAX_TOKENS: u32 = 200;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub fn analysis_prompt(logs_text: &str, metrics_text: Option<&str>) -> String {
    let metrics = metrics_text.unwrap_or("No metrics available");
    format!(
        r#"You are an expert SRE analyzing production application logs.

**Logs Data:**
{logs}

**Metrics Data:**
{metrics}

**Your Task:**
Analyze the logs to identify critical issues requiring immediate attention. Focus on:
1. Error frequency and patterns (multiple errors in short timeframe = critical)
2. Specific error messages and their technical context
3. Impact on application functionality
4. Root cause hypotheses based on error messages
5. Actionable recommendations for developers

**Criteria for creating an issue:**
- 3+ error logs in 15 minutes = HIGH severity
- 5+ error logs in 15 minutes = CRITICAL severity
- Repeated same error = Pattern issue
- Different errors = Systemic issue
- Application/endpoint failures = P0 priority

**IMPORTANT:**
- Ignore test errors like "test error", "Direct OTEL API test"
- Focus on real application errors with stack traces, exceptions, or failures
- Provide specific, actionable root cause analysis
- Identify affected endpoints/features from error context

**Response Format (JSON only):**
{{
  "shouldCreateIssue": true/false,
  "severity": "critical/high/medium/low",
  "issueTitle": "Specific, actionable title (e.g. 'Database Connection Pool Exhausted')",
  "issueDescription": "Clear description with business impact and technical details",
  "errorPattern": "Specific pattern identified (e.g. 'Connection timeout to PostgreSQL every 2 minutes')",
  "affectedEndpoints": ["specific endpoints like /api/users, /checkout"],
  "suggestedPriority": "P0/P1/P2/P3",
  "rootCauseHypothesis": "Technical hypothesis with reasoning",
  "recommendation": "Specific action items"
}}

Respond ONLY with valid JSON, no additional text."#,
        logs = logs_text,
        metrics = metrics
    )
}

pub fn summary_prompt(logs_text: &str, max_chars: usize) -> String {
    format!(
        "Summarize these application logs in {} characters or less. Focus on errors, patterns, and key events:\n\n{}\n\nProvide a concise technical summary.",
        max_chars, logs_text
    )
}

pub struct OpenAiEngine {
    http: reqwest::Client,
    config: AnalysisConfig,
}

impl OpenAiEngine {
    pub fn new(config: AnalysisConfig) -> anyhow::Result<Self> {
        if config.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
            anyhow::bail!("analysis.api_key is required");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let key = self.config.api_key.as_deref().unwrap_or_default();

        let resp = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(request)
            .send()
            .await
            .map_err(|e| TripwireError::Analysis(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TripwireError::Analysis(format!(
                "{} returned {}: {}",
                url,
                status,
                body.trim()
            )));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| TripwireError::Analysis(format!("unexpected response body: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TripwireError::Analysis("response carried no choices".into()))
    }
}

#[async_trait]
impl AnalysisEngine for OpenAiEngine {
    fn name(&self) -> &str {
        "openai"
    }

    async fn analyze(&self, logs_text: &str, metrics_text: Option<&str>) -> Result<AnalysisVerdict> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: analysis_prompt(logs_text, metrics_text),
            }],
            temperature: self.config.temperature,
            response_format: Some(ResponseFormat { kind: "json_object" }),
            max_tokens: None,
        };

        let content = self.complete(&request).await?;
        AnalysisVerdict::from_json(&content)
    }

    async fn summarize(&self, logs_text: &str, max_chars: usize) -> String {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: summary_prompt(logs_text, max_chars),
            }],
            temperature: self.config.temperature,
            response_format: None,
            max_tokens: Some(SUMMARY_MAX_TOKENS),
        };

        match self.complete(&request).await {
            Ok(summary) => summary,
            Err(e) => {
                log::error!("Error summarizing logs: {}", e);
                SUMMARY_ERROR.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tripwire_core::{Priority, Severity};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine(server: &MockServer) -> OpenAiEngine {
        OpenAiEngine::new(AnalysisConfig {
            api_key: Some("sk-test".into()),
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn prompt_embeds_logs_and_metrics_fallback() {
        let prompt = analysis_prompt("[1] 2024-05-01T10:00:00.000Z | ERROR | boom", None);
        assert!(prompt.contains("| ERROR | boom"));
        assert!(prompt.contains("No metrics available"));
        assert!(prompt.contains("5+ error logs in 15 minutes = CRITICAL severity"));
        assert!(prompt.contains("\"shouldCreateIssue\": true/false"));
    }

    #[test]
    fn requires_api_key() {
        assert!(OpenAiEngine::new(AnalysisConfig::default()).is_err());
    }

    #[tokio::test]
    async fn analyze_requests_json_and_parses_verdict() {
        let server = MockServer::start().await;
        let verdict = json!({
            "shouldCreateIssue": true,
            "severity": "critical",
            "issueTitle": "Database Connection Pool Exhausted",
            "suggestedPriority": "P0",
            "affectedEndpoints": ["/api/users"]
        })
        .to_string();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4-turbo-preview",
                "temperature": 0.3,
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&verdict)))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = engine(&server).analyze("logs", None).await.unwrap();
        assert!(verdict.should_create_issue);
        assert_eq!(verdict.severity, Severity::Critical);
        assert_eq!(verdict.suggested_priority, Priority::P0);
        assert_eq!(verdict.affected_endpoints, vec!["/api/users"]);
    }

    #[tokio::test]
    async fn non_json_reply_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("I think it's fine")))
            .mount(&server)
            .await;

        let err = engine(&server).analyze("logs", None).await.unwrap_err();
        assert!(matches!(err, TripwireError::MalformedVerdict(_)));
    }

    #[tokio::test]
    async fn api_failure_is_analysis_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = engine(&server).analyze("logs", Some("metrics")).await.unwrap_err();
        assert!(matches!(err, TripwireError::Analysis(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn summarize_caps_tokens_and_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "max_tokens": 200 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Pool exhaustion under load")))
            .mount(&server)
            .await;

        assert_eq!(
            engine(&server).summarize("logs", 500).await,
            "Pool exhaustion under load"
        );

        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&broken)
            .await;
        assert_eq!(engine(&broken).summarize("logs", 500).await, SUMMARY_ERROR);
    }
}
