use crate::config::Config;
use crate::error::GenerationError;
use crate::models::paper::PaperMeta;
use crate::models::quota::Quota;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// A text-generation backend: prompt in, raw response text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    fn name(&self) -> String;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

fn unavailable(provider: &str, reason: impl ToString) -> GenerationError {
    GenerationError::GenerativeUnavailable {
        provider: provider.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(client: Client, api_key: String, base_url: String, model: String, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
        }
    }

    async fn chat_openai(&self, payload: JsonValue) -> Result<String, GenerationError> {
        let provider = self.name();
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unavailable(&provider, e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(unavailable(&provider, format!("API error {}: {}", status, text)));
        }

        let body: JsonValue = res.json().await.map_err(|e| unavailable(&provider, e))?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| unavailable(&provider, "response has no message content"))
    }
}

#[async_trait]
impl GenerativeProvider for OpenAiProvider {
    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You write school examination papers and reply with JSON only."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.7
        });
        self.chat_openai(payload).await
    }
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    const BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta/models";

    pub fn new(client: Client, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            model,
            timeout,
        }
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let provider = self.name();
        let payload = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}]
        });

        let res = self
            .client
            .post(format!("{}/{}:generateContent", Self::BASE_URL, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unavailable(&provider, e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(unavailable(&provider, format!("API error {}: {}", status, text)));
        }

        let body: JsonValue = res.json().await.map_err(|e| unavailable(&provider, e))?;
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| unavailable(&provider, "response has no candidate text"))
    }
}

/// Providers tried in order until one answers.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn GenerativeProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn GenerativeProvider>>) -> Self {
        Self { providers }
    }

    /// Gemini models first, then OpenAI models, for whichever keys are set.
    pub fn from_config(config: &Config, client: Client) -> Self {
        let timeout = Duration::from_secs(config.ai_timeout_secs);
        let mut providers: Vec<Arc<dyn GenerativeProvider>> = Vec::new();

        if let Some(key) = &config.google_api_key {
            for model in &config.gemini_models {
                providers.push(Arc::new(GeminiProvider::new(
                    client.clone(),
                    key.clone(),
                    model.clone(),
                    timeout,
                )));
            }
        }
        if let Some(key) = &config.openai_api_key {
            for model in &config.openai_models {
                providers.push(Arc::new(OpenAiProvider::new(
                    client.clone(),
                    key.clone(),
                    config.openai_base_url.clone(),
                    model.clone(),
                    timeout,
                )));
            }
        }

        if providers.is_empty() {
            tracing::warn!("No generative provider configured; papers will come from the question bank");
        }
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// First successful response. Every failure, whatever its cause, is
    /// reported as `GenerativeUnavailable`.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut last = unavailable("none", "no generative provider configured");

        for provider in &self.providers {
            let name = provider.name();
            match provider.generate(prompt).await {
                Ok(text) => {
                    tracing::info!(provider = %name, chars = text.len(), "Generative draft received");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "Generative provider failed");
                    last = match e {
                        e @ GenerationError::GenerativeUnavailable { .. } => e,
                        other => unavailable(&name, other),
                    };
                }
            }
        }
        Err(last)
    }
}

/// Instruction text for one paper request.
pub fn build_prompt(meta: &PaperMeta, quota: &Quota, topic: Option<&str>, chapters: &[String]) -> String {
    let distribution = quota
        .requested()
        .iter()
        .map(|r| format!("{}: {} questions of {} marks each", r.label, r.count, r.marks))
        .collect::<Vec<_>>()
        .join("; ");
    let difficulty = if quota.difficulty().is_empty() {
        "balanced".to_string()
    } else {
        quota
            .difficulty()
            .iter()
            .map(|(label, weight)| format!("{}: {}", label, weight))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut prompt = format!(
        "You are an experienced {board} school teacher.\n\
         Create a question paper for Class {class}, Subject: {subject}.\n\
         School: {school}\n\
         Exam: {exam}\n\
         Write every question in {language}.\n\n\
         Question type distribution: {distribution}\n\
         Difficulty distribution: {difficulty}\n",
        board = meta.board,
        class = meta.class_name,
        subject = meta.subject,
        school = meta.school_name,
        exam = meta.exam_name,
        language = meta.language,
    );

    if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
        prompt.push_str(&format!("Focus on the topic: {}\n", topic));
    }
    if !chapters.is_empty() {
        prompt.push_str(&format!("Only use these chapters: {}\n", chapters.join(", ")));
    }

    prompt.push_str(
        "\nOutput only a valid JSON array. Each item must have:\n\
         - type (MCQ, Fill in the Blanks, Short Answer, Long Answer, Matching, Case Study)\n\
         - question (text of the question)\n\
         - marks (marks per question)\n\
         - difficulty (Easy, Medium, Hard)\n\
         - options (exactly four strings, MCQ only)\n\
         - answer (the correct answer)\n\
         - explanation (one sentence)\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quota::RequestedType;

    fn mock(name: &'static str, outcome: std::result::Result<&'static str, &'static str>) -> MockGenerativeProvider {
        let mut provider = MockGenerativeProvider::new();
        provider.expect_name().return_const(name.to_string());
        provider.expect_generate().times(1).returning(move |_| match outcome {
            Ok(text) => Ok(text.to_string()),
            Err(reason) => Err(unavailable(name, reason)),
        });
        provider
    }

    #[tokio::test]
    async fn falls_through_to_the_next_provider() {
        let chain = ProviderChain::new(vec![
            Arc::new(mock("first", Err("quota exceeded"))),
            Arc::new(mock("second", Ok("[]"))),
        ]);
        assert_eq!(chain.generate("prompt").await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn stops_at_the_first_success() {
        let mut never = MockGenerativeProvider::new();
        never.expect_name().return_const("never".to_string());
        never.expect_generate().never();

        let chain = ProviderChain::new(vec![Arc::new(mock("first", Ok("draft"))), Arc::new(never)]);
        assert_eq!(chain.generate("prompt").await.unwrap(), "draft");
    }

    #[tokio::test]
    async fn other_errors_are_reported_as_unavailable() {
        let mut odd = MockGenerativeProvider::new();
        odd.expect_name().return_const("odd".to_string());
        odd.expect_generate()
            .returning(|_| Err(GenerationError::MalformedDraft));

        let err = ProviderChain::new(vec![Arc::new(odd)])
            .generate("prompt")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::GenerativeUnavailable { ref provider, .. } if provider == "odd"
        ));
    }

    #[tokio::test]
    async fn empty_chain_is_unavailable() {
        let chain = ProviderChain::default();
        assert!(chain.is_empty());
        assert!(matches!(
            chain.generate("prompt").await,
            Err(GenerationError::GenerativeUnavailable { .. })
        ));
    }

    #[test]
    fn prompt_carries_request_details() {
        let meta = PaperMeta {
            exam_name: "Unit Test".into(),
            school_name: "Sunrise Public School".into(),
            board: "ICSE".into(),
            class_name: "7".into(),
            subject: "Geography".into(),
            language: "hindi".into(),
        };
        let quota = Quota::build(
            vec![RequestedType {
                label: "MCQ".into(),
                count: 4,
                marks: 1,
            }],
            vec![("Easy".into(), 60.0), ("Hard".into(), 40.0)],
        )
        .unwrap();

        let prompt = build_prompt(&meta, &quota, Some("Rivers"), &["Water Bodies".to_string()]);
        assert!(prompt.contains("ICSE school teacher"));
        assert!(prompt.contains("Class 7, Subject: Geography"));
        assert!(prompt.contains("MCQ: 4 questions of 1 marks each"));
        assert!(prompt.contains("Easy: 60"));
        assert!(prompt.contains("Focus on the topic: Rivers"));
        assert!(prompt.contains("Only use these chapters: Water Bodies"));
        assert!(prompt.contains("in hindi"));
        assert!(prompt.contains("valid JSON array"));
    }
}
