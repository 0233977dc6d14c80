use std::time::Duration;

use anyhow::{anyhow, Context};
use packed_contracts::design::{tech_pack_response_schema, ImageRef, ImageRefError, TechPack};
use packed_contracts::models::{
    ModelSelector, CAPABILITY_EDIT, CAPABILITY_IMAGE, CAPABILITY_SEARCH, CAPABILITY_STRUCTURED,
};
use packed_contracts::trends::TREND_RESEARCH_PROMPT;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::config::StudioConfig;
use crate::error::{GenerationError, Operation};
use crate::prompts::{edit_text, synthesize_text, tech_pack_text, DESIGN_ASPECT_RATIO};
use crate::GenerationClient;

pub struct GeminiClient {
    api_base: String,
    api_key: Option<String>,
    image_model: String,
    text_model: String,
    timeout: Duration,
    http: HttpClient,
    warnings: Vec<String>,
}

impl GeminiClient {
    pub fn new(config: &StudioConfig) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .build()
            .context("failed to build Gemini HTTP client")?;
        Self::with_http(config, http)
    }

    fn with_http(config: &StudioConfig, http: HttpClient) -> anyhow::Result<Self> {
        let selector = ModelSelector::new(None);
        let image = selector
            .select(
                config.image_model.as_deref(),
                &[CAPABILITY_IMAGE, CAPABILITY_EDIT],
                "gemini",
            )
            .map_err(|err| anyhow!(err))?;
        let text = selector
            .select(
                config.text_model.as_deref(),
                &[CAPABILITY_STRUCTURED, CAPABILITY_SEARCH],
                "gemini",
            )
            .map_err(|err| anyhow!(err))?;
        let warnings = [image.fallback_reason, text.fallback_reason]
            .into_iter()
            .flatten()
            .collect();
        Ok(Self {
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            image_model: image.model.name,
            text_model: text.model.name,
            timeout: config.request_timeout,
            http,
            warnings,
        })
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    /// Model fallback notes collected while resolving the configured models.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn post(&self, operation: Operation, model: &str, payload: &Value) -> Result<Value, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey)?;
        let endpoint = self.endpoint_for_model(model);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .timeout(self.timeout)
            .json(payload)
            .send()
            .map_err(|err| self.transport_error(operation, &endpoint, err))?;
        self.response_json_or_error(operation, &endpoint, response)
    }

    fn transport_error(&self, operation: Operation, endpoint: &str, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            return GenerationError::TimedOut {
                operation,
                seconds: self.timeout.as_secs_f64().ceil() as u64,
            };
        }
        // The key travels in the query string; keep it out of messages.
        let err = anyhow::Error::new(err.without_url())
            .context(format!("Gemini request failed ({endpoint})"));
        GenerationError::failed(operation, error_chain_text(&err, 512))
    }

    fn response_json_or_error(
        &self,
        operation: Operation,
        endpoint: &str,
        response: HttpResponse,
    ) -> Result<Value, GenerationError> {
        let status = response.status();
        let code = status.as_u16();
        let body = response
            .text()
            .map_err(|err| self.transport_error(operation, endpoint, err))?;
        if !status.is_success() {
            return Err(GenerationError::failed(
                operation,
                format!("Gemini request failed ({code}): {}", truncate_text(&body, 512)),
            ));
        }
        serde_json::from_str(&body).map_err(|err| {
            GenerationError::failed(
                operation,
                format!("Gemini returned invalid JSON payload: {err}"),
            )
        })
    }

    fn image_call(&self, operation: Operation, payload: &Value) -> Result<ImageRef, GenerationError> {
        let response = self.post(operation, &self.image_model, payload)?;
        extract_first_image(&response)
            .map_err(|err| GenerationError::failed(operation, err.to_string()))?
            .ok_or_else(|| {
                GenerationError::failed(operation, describe_missing_output("image", &response))
            })
    }
}

impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn synthesize(&self, prompt: &str, brand_context: Option<&str>) -> Result<ImageRef, GenerationError> {
        self.image_call(Operation::Synthesize, &synthesize_payload(prompt, brand_context))
    }

    fn edit(&self, source: &ImageRef, instruction: &str) -> Result<ImageRef, GenerationError> {
        self.image_call(Operation::Edit, &edit_payload(source, instruction))
    }

    fn extract_spec(&self, source: &ImageRef, context_prompt: &str) -> Result<TechPack, GenerationError> {
        let response = self.post(
            Operation::ExtractSpec,
            &self.text_model,
            &extract_spec_payload(source, context_prompt),
        )?;
        let text = extract_text(&response).ok_or_else(|| {
            GenerationError::SpecParseFailed(describe_missing_output("text", &response))
        })?;
        TechPack::from_response_text(&text)
            .map_err(|err| GenerationError::SpecParseFailed(err.to_string()))
    }

    fn fetch_trend_report(&self) -> Result<String, GenerationError> {
        let response = self.post(
            Operation::FetchTrendReport,
            &self.text_model,
            &trend_payload(),
        )?;
        Ok(extract_text(&response).unwrap_or_default())
    }
}

fn inline_part(image: &ImageRef) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type(),
            "data": image.payload(),
        }
    })
}

pub(crate) fn synthesize_payload(prompt: &str, brand_context: Option<&str>) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": synthesize_text(prompt, brand_context) }],
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": { "aspectRatio": DESIGN_ASPECT_RATIO },
        },
    })
}

pub(crate) fn edit_payload(source: &ImageRef, instruction: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_part(source), { "text": edit_text(instruction) }],
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
        },
    })
}

pub(crate) fn extract_spec_payload(source: &ImageRef, context_prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_part(source), { "text": tech_pack_text(context_prompt) }],
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": tech_pack_response_schema(),
        },
    })
}

pub(crate) fn trend_payload() -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": TREND_RESEARCH_PROMPT }],
        }],
        "tools": [{ "googleSearch": {} }],
    })
}

/// First decodable inline image across all candidates, in response order.
///
/// Undecodable parts are skipped; the first decode error is returned only
/// when no later part yields an image.
pub(crate) fn extract_first_image(response: &Value) -> Result<Option<ImageRef>, ImageRefError> {
    let mut first_error = None;
    let candidates = response
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            match ImageRef::from_base64(mime_type, data) {
                Ok(image) => return Ok(Some(image)),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(None),
    }
}

/// Concatenated text parts of the first candidate, skipping thought summaries.
pub(crate) fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)?;
    let texts = parts
        .iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>();
    if texts.is_empty() {
        return None;
    }
    Some(texts.concat())
}

fn describe_missing_output(kind: &str, response: &Value) -> String {
    let mut message = format!("response contained no {kind} part");
    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
    {
        message.push_str(&format!(" (blocked: {reason})"));
    } else if let Some(reason) = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("finishReason"))
        .and_then(Value::as_str)
    {
        message.push_str(&format!(" (finish reason: {reason})"));
    }
    message
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing: &String| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    use packed_contracts::design::ImageRef;
    use reqwest::blocking::Client as HttpClient;
    use serde_json::{json, Value};

    use super::{
        edit_payload, error_chain_text, extract_first_image, extract_spec_payload, extract_text,
        synthesize_payload, trend_payload, GeminiClient,
    };
    use crate::config::StudioConfig;
    use crate::error::{GenerationError, Operation};
    use crate::GenerationClient;

    const PNG_SIGNATURE_B64: &str = "iVBORw0KGgo=";

    fn client_for(api_base: &str, timeout: Duration) -> anyhow::Result<GeminiClient> {
        let config = StudioConfig {
            api_key: Some("test-key".to_string()),
            api_base: api_base.to_string(),
            request_timeout: timeout,
            ..StudioConfig::default()
        };
        GeminiClient::with_http(&config, HttpClient::builder().no_proxy().build()?)
    }

    fn read_http_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(read) => read,
            };
            buf.extend_from_slice(&chunk[..read]);
            let Some(header_end) = buf.windows(4).position(|window| window == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn serve_once(body: String, delay: Duration) -> anyhow::Result<(String, thread::JoinHandle<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let handle = thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return String::new();
            };
            let request = read_http_request(&mut stream);
            thread::sleep(delay);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
            request
        });
        Ok((format!("http://{addr}"), handle))
    }

    #[test]
    fn default_models_match_service_contract() -> anyhow::Result<()> {
        let client = client_for("https://example.test/v1beta/", Duration::from_secs(90))?;
        assert_eq!(client.image_model(), "gemini-2.5-flash-image");
        assert_eq!(client.text_model(), "gemini-3-flash-preview");
        assert!(client.warnings().is_empty());
        assert_eq!(
            client.endpoint_for_model("gemini-2.5-flash-image"),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        Ok(())
    }

    #[test]
    fn unknown_model_falls_back_with_warning() -> anyhow::Result<()> {
        let config = StudioConfig {
            image_model: Some("imagen-9".to_string()),
            ..StudioConfig::default()
        };
        let client = GeminiClient::with_http(&config, HttpClient::builder().no_proxy().build()?)?;
        assert_eq!(client.image_model(), "gemini-2.5-flash-image");
        assert_eq!(client.warnings().len(), 1);
        assert!(client.warnings()[0].contains("imagen-9"));
        Ok(())
    }

    #[test]
    fn synthesize_payload_requests_portrait_image() {
        let payload = synthesize_payload("red wool coat", Some("Primary Black: #0a0a0a"));
        assert_eq!(
            payload["contents"][0]["parts"][0]["text"],
            json!("Fashion design based on: red wool coat. Apply brand DNA: Primary Black: #0a0a0a")
        );
        assert_eq!(
            payload["generationConfig"]["imageConfig"]["aspectRatio"],
            json!("3:4")
        );
    }

    #[test]
    fn edit_and_spec_payloads_resend_stripped_image() {
        let source = ImageRef::from_bytes("image/png", b"pixels");
        let edit = edit_payload(&source, "add gold buttons");
        let parts = &edit["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["data"], json!(source.payload()));
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["text"], json!("Modify this design: add gold buttons"));
        assert!(!parts[0]["inlineData"]["data"]
            .as_str()
            .unwrap_or_default()
            .starts_with("data:"));

        let spec = extract_spec_payload(&source, "red wool coat");
        assert_eq!(
            spec["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(
            spec["generationConfig"]["responseSchema"]["required"],
            json!(["bom", "measurements", "constructionNotes"])
        );
    }

    #[test]
    fn trend_payload_enables_search_tool() {
        let payload = trend_payload();
        assert_eq!(payload["tools"], json!([{ "googleSearch": {} }]));
        assert!(payload["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .contains("trending fashion color palettes"));
    }

    #[test]
    fn extract_first_image_scans_parts_in_order() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [
                {"content": {"parts": [{"text": "Here is your coat"}]}},
                {"content": {"parts": [
                    {"inline_data": {"mime_type": "image/jpeg", "data": "AAEC"}},
                    {"inlineData": {"mimeType": "image/png", "data": PNG_SIGNATURE_B64}}
                ]}}
            ]
        });
        let image = extract_first_image(&response)?.unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.decode_bytes()?, vec![0, 1, 2]);

        assert_eq!(extract_first_image(&json!({"candidates": []}))?, None);
        assert!(extract_first_image(&json!({
            "candidates": [{"content": {"parts": [{"inlineData": {"data": "%%%"}}]}}]
        }))
        .is_err());
        Ok(())
    }

    #[test]
    fn extract_first_image_skips_undecodable_parts() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "%%%"}},
                {"inlineData": {"mimeType": "image/jpeg", "data": "AAEC"}}
            ]}}]
        });
        let image = extract_first_image(&response)?.unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.decode_bytes()?, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn extract_text_joins_first_candidate_parts() {
        let response = json!({
            "candidates": [{"content": {"parts": [
                {"text": "thinking...", "thought": true},
                {"text": "{\"bom\": "},
                {"text": "[]}"}
            ]}}]
        });
        assert_eq!(extract_text(&response).as_deref(), Some("{\"bom\": []}"));
        assert_eq!(extract_text(&json!({})), None);
    }

    #[test]
    fn missing_api_key_fails_before_network() -> anyhow::Result<()> {
        let config = StudioConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..StudioConfig::default()
        };
        let client = GeminiClient::with_http(&config, HttpClient::builder().no_proxy().build()?)?;
        assert_eq!(
            client.synthesize("coat", None),
            Err(GenerationError::MissingApiKey)
        );
        Ok(())
    }

    #[test]
    fn synthesize_round_trips_through_http() -> anyhow::Result<()> {
        let body = json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here is the design."},
                {"inlineData": {"mimeType": "image/png", "data": PNG_SIGNATURE_B64}}
            ]}}]
        })
        .to_string();
        let (base, server) = serve_once(body, Duration::ZERO)?;
        let client = client_for(&base, Duration::from_secs(10))?;

        let image = client.synthesize("red wool coat", None)?;
        assert_eq!(
            image.to_data_uri(),
            format!("data:image/png;base64,{PNG_SIGNATURE_B64}")
        );

        let request = server.join().unwrap_or_default();
        assert!(request.starts_with(
            "POST /models/gemini-2.5-flash-image:generateContent?key=test-key"
        ));
        let body_start = request.find("\r\n\r\n").map(|idx| idx + 4).unwrap_or(0);
        let sent: Value = serde_json::from_str(&request[body_start..])?;
        assert_eq!(
            sent["contents"][0]["parts"][0]["text"],
            json!("High-quality photorealistic fashion design: red wool coat")
        );
        Ok(())
    }

    #[test]
    fn response_without_image_is_generation_failure() -> anyhow::Result<()> {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "I can't draw that."}]}, "finishReason": "STOP"}]
        })
        .to_string();
        let (base, _server) = serve_once(body, Duration::ZERO)?;
        let client = client_for(&base, Duration::from_secs(10))?;

        let err = client.synthesize("coat", None).err();
        assert_eq!(
            err,
            Some(GenerationError::GenerationFailed(
                "response contained no image part (finish reason: STOP)".to_string()
            ))
        );
        Ok(())
    }

    #[test]
    fn malformed_spec_response_is_spec_parse_failure() -> anyhow::Result<()> {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "{\"bom\": \"oops\"}"}]}}]
        })
        .to_string();
        let (base, _server) = serve_once(body, Duration::ZERO)?;
        let client = client_for(&base, Duration::from_secs(10))?;
        let source = ImageRef::from_bytes("image/png", b"pixels");

        let err = client.extract_spec(&source, "coat").err();
        assert!(matches!(err, Some(GenerationError::SpecParseFailed(_))));
        Ok(())
    }

    #[test]
    fn slow_service_times_out() -> anyhow::Result<()> {
        let (base, _server) = serve_once("{}".to_string(), Duration::from_secs(3))?;
        let client = client_for(&base, Duration::from_millis(300))?;

        let err = client.fetch_trend_report().err();
        assert_eq!(
            err,
            Some(GenerationError::TimedOut {
                operation: Operation::FetchTrendReport,
                seconds: 1,
            })
        );
        Ok(())
    }

    #[test]
    fn error_chain_text_dedupes_causes() {
        let err = anyhow::anyhow!("connection refused")
            .context("connection refused")
            .context("Gemini request failed (https://example.test)");
        assert_eq!(
            error_chain_text(&err, 512),
            "Gemini request failed (https://example.test) | caused by: connection refused"
        );
    }
}
