use serde_json::json;

use super::OpenAiClient;
use crate::error::ApiError;

impl OpenAiClient {
    /// Generate one image for `prompt`, returning its URL
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ApiError> {
        let body = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "n": 1,
            "size": self.config.image_size,
        });

        let response = self.post_json("images/generations", &body, false).await?;
        let json = Self::read_json(response).await?;

        json["data"][0]["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("no image URL in response".to_string()))
    }
}
