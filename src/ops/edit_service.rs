// ============================================================================
// EDIT SERVICE: hands the original image, mask and prompt to an image editor
// ============================================================================
//
// The editor itself is an opaque collaborator. `EchoEditService` answers
// locally by sending the original back; `HttpEditService` POSTs the request
// as JSON to a configured endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request timeout for remote edit services.
pub const EDIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Body sent to the edit service. Images are PNG data URIs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub original_image: String,
    pub mask_image: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

/// Reply from the edit service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EditResponse {
    /// Turn a reply into the edited image's data URI, or the reason there is none.
    pub fn into_edited_image(self) -> Result<String, EditError> {
        if !self.success {
            return Err(EditError::Rejected(
                self.error.unwrap_or_else(|| "Failed to process image edit".to_string()),
            ));
        }
        self.edited_image.ok_or(EditError::MissingImage)
    }
}

#[derive(Debug)]
pub enum EditError {
    /// The source raster or mask could not be encoded for upload.
    Encode(String),
    /// Network failure, timeout, or an unreadable reply body.
    Transport(String),
    /// The service answered `success: false`.
    Rejected(String),
    /// `success: true` without an `editedImage`.
    MissingImage,
    /// The returned image could not be decoded.
    Decode(String),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::Encode(e) => write!(f, "Failed to encode image for edit: {}", e),
            EditError::Transport(e) => write!(f, "Edit service unreachable: {}", e),
            EditError::Rejected(e) => write!(f, "Edit service rejected the request: {}", e),
            EditError::MissingImage => write!(f, "Edit service returned no image"),
            EditError::Decode(e) => write!(f, "Could not decode edited image: {}", e),
        }
    }
}

impl std::error::Error for EditError {}

pub trait EditService: Send + Sync {
    /// Short name for logs and the status line.
    fn name(&self) -> &str;

    fn edit(&self, request: &EditRequest) -> Result<EditResponse, EditError>;
}

/// Reference service: returns the original image unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoEditService;

impl EditService for EchoEditService {
    fn name(&self) -> &str {
        "echo"
    }

    fn edit(&self, request: &EditRequest) -> Result<EditResponse, EditError> {
        Ok(EditResponse {
            success: true,
            edited_image: Some(request.original_image.clone()),
            error: None,
        })
    }
}

pub struct HttpEditService {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpEditService {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, EditError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(EDIT_TIMEOUT)
            .user_agent(concat!("maskfe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EditError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EditService for HttpEditService {
    fn name(&self) -> &str {
        &self.endpoint
    }

    fn edit(&self, request: &EditRequest) -> Result<EditResponse, EditError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|e| EditError::Transport(e.to_string()))?;
        let status = resp.status();
        // Failed edits still carry a JSON body with `success: false`.
        match resp.json::<EditResponse>() {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(EditError::Transport(format!("HTTP {}", status))),
            Err(e) => Err(EditError::Transport(e.to_string())),
        }
    }
}

/// Pick a service from a configured endpoint; empty means the echo service.
pub fn service_for_endpoint(endpoint: &str) -> Result<Box<dyn EditService>, EditError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() || endpoint.eq_ignore_ascii_case("echo") {
        Ok(Box::new(EchoEditService))
    } else {
        Ok(Box::new(HttpEditService::new(endpoint)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(negative: Option<&str>) -> EditRequest {
        EditRequest {
            original_image: "data:image/png;base64,AAAA".into(),
            mask_image: "data:image/png;base64,BBBB".into(),
            prompt: "a blue sky".into(),
            negative_prompt: negative.map(String::from),
        }
    }

    #[test]
    fn request_uses_camel_case_and_skips_missing_negative() {
        let json = serde_json::to_value(request(None)).unwrap();
        assert_eq!(json["originalImage"], "data:image/png;base64,AAAA");
        assert_eq!(json["maskImage"], "data:image/png;base64,BBBB");
        assert!(json.get("negativePrompt").is_none());

        let json = serde_json::to_value(request(Some("blurry"))).unwrap();
        assert_eq!(json["negativePrompt"], "blurry");
    }

    #[test]
    fn response_parses_failure_body() {
        let resp: EditResponse =
            serde_json::from_str(r#"{"success":false,"error":"Failed to process image edit"}"#).unwrap();
        match resp.into_edited_image() {
            Err(EditError::Rejected(msg)) => assert_eq!(msg, "Failed to process image edit"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn response_ignores_extra_fields() {
        let resp: EditResponse = serde_json::from_str(
            r#"{"success":true,"editedImage":"data:x","prompt":"p","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(resp.into_edited_image().unwrap(), "data:x");
    }

    #[test]
    fn success_without_image_is_an_error() {
        let resp = EditResponse { success: true, ..Default::default() };
        assert!(matches!(resp.into_edited_image(), Err(EditError::MissingImage)));
    }

    #[test]
    fn echo_returns_original() {
        let req = request(None);
        let resp = EchoEditService.edit(&req).unwrap();
        assert!(resp.success);
        assert_eq!(resp.edited_image.as_deref(), Some(req.original_image.as_str()));
    }

    #[test]
    fn empty_endpoint_selects_echo() {
        assert_eq!(service_for_endpoint("").unwrap().name(), "echo");
        assert_eq!(service_for_endpoint("  echo ").unwrap().name(), "echo");
    }
}
