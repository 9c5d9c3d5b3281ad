use crate::config::UpstreamConfig;

/// Substring that marks a model as image-capable on the combined proxy route.
pub const IMAGE_MODEL_MARKER: &str = "imagen";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GenerateContent,
    Predict,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateContent => "generateContent",
            Self::Predict => "predict",
        }
    }

    /// Loose check kept from the original routing: any model whose id merely
    /// contains the marker is sent to `predict`, including false positives.
    pub fn for_model(model: &str) -> Self {
        if model.contains(IMAGE_MODEL_MARKER) {
            Self::Predict
        } else {
            Self::GenerateContent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    QueryParamKey,
    BearerHeader,
}

/// Where an outbound call goes. The verb is always POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub url: String,
    pub operation: Operation,
    pub auth_style: AuthStyle,
}

#[derive(Debug, Clone)]
pub struct EndpointRouter {
    text_api_base_url: String,
    image_api_base_url: String,
    image_location: String,
    image_model: String,
}

impl EndpointRouter {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            text_api_base_url: config.text_api_base_url.trim_end_matches('/').to_string(),
            image_api_base_url: config.image_api_base_url.trim_end_matches('/').to_string(),
            image_location: config.image_location.clone(),
            image_model: config.image_model.clone(),
        }
    }

    /// Target for the combined proxy route, keyed only by model id.
    pub fn proxy_target(&self, model: &str) -> UpstreamTarget {
        self.text_api_target(model, Operation::for_model(model))
    }

    pub fn chat_target(&self, model: &str) -> UpstreamTarget {
        self.text_api_target(model, Operation::GenerateContent)
    }

    /// Project-scoped Vertex AI prediction endpoint for the image route.
    pub fn image_target(&self, project_id: &str) -> UpstreamTarget {
        let location = &self.image_location;
        UpstreamTarget {
            url: format!(
                "{}/projects/{project_id}/locations/{location}/publishers/google/models/{}:{}",
                self.image_api_base_url,
                self.image_model,
                Operation::Predict.as_str()
            ),
            operation: Operation::Predict,
            auth_style: AuthStyle::BearerHeader,
        }
    }

    fn text_api_target(&self, model: &str, operation: Operation) -> UpstreamTarget {
        UpstreamTarget {
            url: format!(
                "{}/{model}:{}",
                self.text_api_base_url,
                operation.as_str()
            ),
            operation,
            auth_style: AuthStyle::QueryParamKey,
        }
    }
}
