use serde_json::{Value, json};

use super::error::GatewayError;
use crate::models::ImageAsset;

const ASSET_CONNECTOR: &str = "featuring elements from:";
const UNNAMED_ASSET: &str = "unnamed asset";
const IMAGE_SAMPLE_COUNT: u32 = 1;

/// Wraps the writer's message and working context in the co-author persona
/// and packages it as a single-part `generateContent` body.
pub fn build_chat_payload(message: Option<&str>, context: Option<&str>) -> Result<Value, GatewayError> {
    let message = message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| GatewayError::invalid_input("Message is required."))?;

    Ok(json!({
        "contents": [{
            "parts": [{ "text": chat_prompt(message, context.unwrap_or_default()) }]
        }]
    }))
}

fn chat_prompt(message: &str, context: &str) -> String {
    format!(
        "\nYou are AIME, an AI co-author. Your goal is to assist a user in their creative writing project.\n\
         You must be helpful, encouraging, and provide insightful suggestions.\n\
         The user is currently working on the following part of their project:\n\
         ---\n\
         {context}\n\
         ---\n\
         The user's message is: \"{message}\"\n\
         Please provide a helpful and context-aware response.\n"
    )
}

/// Builds the image superprompt from the base prompt, style tags ("gems") and
/// attached asset names.
pub fn compose_superprompt(prompt: &str, gems: &[String], assets: &[ImageAsset]) -> String {
    let mut superprompt = prompt.to_string();

    if !gems.is_empty() {
        superprompt.push_str(", ");
        superprompt.push_str(&gems.join(", "));
    }

    if !assets.is_empty() {
        let names = assets
            .iter()
            .map(|asset| asset.file_name.as_deref().unwrap_or(UNNAMED_ASSET))
            .collect::<Vec<_>>();
        superprompt.push_str(", ");
        superprompt.push_str(ASSET_CONNECTOR);
        superprompt.push(' ');
        superprompt.push_str(&names.join(", "));
    }

    normalize_segments(&superprompt)
}

/// Splits on commas, trims every segment, drops empty ones and rejoins with
/// a single `", "`.
pub fn normalize_segments(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_image_payload(superprompt: &str) -> Value {
    json!({
        "instances": [{ "prompt": superprompt }],
        "parameters": { "sampleCount": IMAGE_SAMPLE_COUNT }
    })
}
