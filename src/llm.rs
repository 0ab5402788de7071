use async_trait::async_trait;
use serde_json::json;

use crate::enrich::{TransformError, TransformTask, Transformer};

/// [`Transformer`] backed by any OpenAI-compatible `/chat/completions`
/// endpoint (OpenAI, LMStudio, vLLM, OpenRouter, ...).
pub struct OpenAiTransformer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiTransformer {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("medinsight/", env!("CARGO_PKG_VERSION")))
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Transformer for OpenAiTransformer {
    async fn transform(
        &self,
        text: &str,
        task: TransformTask,
    ) -> Result<String, TransformError> {
        let input = truncate_chars(text, task.input_cap());
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": task.system_prompt()},
                {"role": "user", "content": format!("{}\n{}", task.user_prefix(), input)},
            ],
            "temperature": task.temperature(),
            "max_tokens": task.max_tokens(),
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let json: serde_json::Value = resp.json().await?;
        if status >= 400 {
            let message = json["error"]["message"]
                .as_str()
                .or_else(|| json["message"].as_str())
                .unwrap_or("unknown API error")
                .to_string();
            return Err(TransformError::Api { status, message });
        }

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(TransformError::EmptyCompletion);
        }
        Ok(content)
    }
}

fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() > cap {
        text.chars().take(cap).collect()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_is_char_safe() {
        let text = "çok uzun bir Türkçe metin".repeat(20);
        let cut = truncate_chars(&text, 100);
        assert_eq!(cut.chars().count(), 100);
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let t = OpenAiTransformer::new(
            "https://api.openai.com/v1/".to_string(),
            "sk-test".to_string(),
            "gpt-3.5-turbo".to_string(),
        );
        assert_eq!(t.base_url, "https://api.openai.com/v1");
    }
}
