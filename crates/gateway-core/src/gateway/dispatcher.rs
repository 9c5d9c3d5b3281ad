use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::credentials::CredentialResolver;
use super::error::GatewayError;
use super::google_auth::AmbientIdentity;
use super::invoker::UpstreamInvoker;
use super::normalize::{self, NormalizedResponse};
use super::prompts;
use super::routing::EndpointRouter;
use crate::config::GatewayConfig;
use crate::models::{ChatRequest, ChatResponse, ImageRequest, ImageResponse};

const MODEL_FIELD: &str = "model";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Text,
    Chat,
    Image,
}

impl GenerationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Chat => "chat",
            Self::Image => "image",
        }
    }
}

/// One inbound call. The kind comes from the route, never from the caller.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    /// Upstream model id, only meaningful for text generation.
    pub model: Option<String>,
    pub payload: Value,
    pub caller_api_key: Option<String>,
}

impl GenerationRequest {
    pub fn new(kind: GenerationKind, payload: Value) -> Self {
        Self {
            kind,
            model: None,
            payload,
            caller_api_key: None,
        }
    }

    /// Text request built from a raw provider body. The `model` field is
    /// moved out of the body so it is never forwarded.
    pub fn text(payload: Value) -> Result<Self, GatewayError> {
        let (model, payload) = take_model(payload)?;
        Ok(Self {
            model,
            ..Self::new(GenerationKind::Text, payload)
        })
    }

    pub fn with_caller_api_key(mut self, caller_api_key: Option<&str>) -> Self {
        self.caller_api_key = caller_api_key.map(ToString::to_string);
        self
    }
}

/// Runs the request lifecycle: input validation and request assembly,
/// credentials, routing, one upstream call, normalization. Holds no
/// per-request state.
#[derive(Clone)]
pub struct GatewayService {
    resolver: CredentialResolver,
    router: EndpointRouter,
    invoker: UpstreamInvoker,
    default_text_model: String,
    chat_model: String,
}

impl GatewayService {
    pub fn new(
        config: &GatewayConfig,
        http_client: reqwest::Client,
        identity: Arc<dyn AmbientIdentity>,
    ) -> Self {
        Self {
            resolver: CredentialResolver::new(config, identity),
            router: EndpointRouter::new(&config.upstream),
            invoker: UpstreamInvoker::new(http_client),
            default_text_model: config.upstream.default_text_model.clone(),
            chat_model: config.upstream.chat_model.clone(),
        }
    }

    pub async fn dispatch(
        &self,
        request: GenerationRequest,
    ) -> Result<NormalizedResponse, GatewayError> {
        let caller_api_key = request.caller_api_key.as_deref();
        let result = match request.kind {
            GenerationKind::Text => {
                self.proxy(request.model.as_deref(), request.payload, caller_api_key)
                    .await
            }
            GenerationKind::Chat => self.dispatch_chat(request.payload, caller_api_key).await,
            GenerationKind::Image => self.dispatch_image(request.payload).await,
        };

        if let Err(err) = &result {
            warn!(
                kind = request.kind.as_str(),
                error_kind = %err.kind,
                status = err.status.as_u16(),
                "generation request failed"
            );
        }

        result
    }

    async fn dispatch_chat(
        &self,
        payload: Value,
        caller_api_key: Option<&str>,
    ) -> Result<NormalizedResponse, GatewayError> {
        let chat_request = parse_payload::<ChatRequest>(payload)?;
        let reply = self.chat(chat_request, caller_api_key).await?;
        Ok(ok_json(json!(reply)))
    }

    async fn dispatch_image(&self, payload: Value) -> Result<NormalizedResponse, GatewayError> {
        let image_request = parse_payload::<ImageRequest>(payload)?;
        let reply = self.image(image_request).await?;
        Ok(ok_json(json!(reply)))
    }

    /// Forwards a provider payload as-is, minus any `model` field. An explicit
    /// `model` wins over one still embedded in the payload; with neither the
    /// default text model is used.
    pub async fn proxy(
        &self,
        model: Option<&str>,
        payload: Value,
        caller_api_key: Option<&str>,
    ) -> Result<NormalizedResponse, GatewayError> {
        let (embedded_model, body) = take_model(payload)?;
        let credentials = self.resolver.resolve_static_key(caller_api_key)?;

        let model = model
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(ToString::to_string)
            .or(embedded_model)
            .unwrap_or_else(|| self.default_text_model.clone());
        let target = self.router.proxy_target(&model);
        info!(
            model = %model,
            operation = target.operation.as_str(),
            "proxying generation request"
        );

        let reply = self
            .invoker
            .invoke(&target, &credentials, &body)
            .await
            .map_err(normalize::upstream_failure)?;
        normalize::passthrough(reply)
    }

    pub async fn chat(
        &self,
        request: ChatRequest,
        caller_api_key: Option<&str>,
    ) -> Result<ChatResponse, GatewayError> {
        let body =
            prompts::build_chat_payload(request.message.as_deref(), request.context.as_deref())?;
        let credentials = self.resolver.resolve_static_key(caller_api_key)?;
        let target = self.router.chat_target(&self.chat_model);

        let reply = self
            .invoker
            .invoke(&target, &credentials, &body)
            .await
            .map_err(|failure| {
                let mut err = normalize::upstream_failure(failure);
                err.status = StatusCode::INTERNAL_SERVER_ERROR;
                err
            })?;

        Ok(ChatResponse {
            reply: normalize::chat_reply(&reply)?,
        })
    }

    pub async fn image(&self, request: ImageRequest) -> Result<ImageResponse, GatewayError> {
        let prompt = request
            .prompt
            .as_deref()
            .filter(|prompt| !prompts::normalize_segments(prompt).is_empty())
            .ok_or_else(|| GatewayError::invalid_input("Prompt is required."))?;
        let superprompt = prompts::compose_superprompt(prompt, &request.gems, &request.assets);
        info!(superprompt = %superprompt, "crafted image superprompt");
        let body = prompts::build_image_payload(&superprompt);

        let credentials = self.resolver.resolve_cloud_token().await?;

        let project_id = credentials
            .project_id()
            .ok_or_else(GatewayError::missing_project_id)?;
        let target = self.router.image_target(project_id);

        let reply = self
            .invoker
            .invoke(&target, &credentials, &body)
            .await
            .map_err(normalize::upstream_failure)?;
        normalize::image_reply(&reply, &superprompt)
    }
}

/// Removes `model` from a provider body. Absent, null and blank all mean
/// "no model"; anything other than a string is rejected.
fn take_model(payload: Value) -> Result<(Option<String>, Value), GatewayError> {
    let Value::Object(mut fields) = payload else {
        return Err(GatewayError::invalid_input(
            "Request body must be a JSON object.",
        ));
    };

    let model = match fields.remove(MODEL_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(model)) if !model.trim().is_empty() => Some(model.trim().to_string()),
        Some(Value::String(_)) => None,
        Some(_) => return Err(GatewayError::invalid_input("model must be a string.")),
    };

    Ok((model, Value::Object(fields)))
}

fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, GatewayError> {
    let payload = match payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    serde_json::from_value(payload)
        .map_err(|err| GatewayError::invalid_input(format!("Invalid request body: {err}")))
}

fn ok_json(body: Value) -> NormalizedResponse {
    NormalizedResponse {
        status: StatusCode::OK,
        body,
    }
}
