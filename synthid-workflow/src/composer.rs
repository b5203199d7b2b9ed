use synthid_client::{ApiError, Backend};
use synthid_types::{Generation, GenerationConfig, GenerationRequest};
use tracing::info;

/// Prompt box of the generate tab.
#[derive(Debug, Default)]
pub struct Composer {
    prompt: String,
    sending: bool,
    result: Option<Generation>,
    last_error: Option<String>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn result(&self) -> Option<&Generation> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Build and validate the request. `Ok(None)` while a send is in flight.
    pub fn begin(&mut self, config: &GenerationConfig) -> Result<Option<GenerationRequest>, ApiError> {
        if self.sending {
            return Ok(None);
        }
        let req = GenerationRequest::new(config.clone(), self.prompt.trim());
        req.validate()?;
        self.sending = true;
        self.result = None;
        self.last_error = None;
        Ok(Some(req))
    }

    pub fn finish(&mut self, result: Result<Generation, ApiError>) -> Result<&Generation, ApiError> {
        self.sending = false;
        match result {
            Ok(gen) => {
                info!(generation = %gen.id, model = %gen.model, "generation created");
                Ok(&*self.result.insert(gen))
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Send the prompt. `Ok(None)` when a send was already in flight.
    pub async fn send(&mut self, backend: &dyn Backend, config: &GenerationConfig) -> Result<Option<Generation>, ApiError> {
        let Some(req) = self.begin(config)? else {
            return Ok(None);
        };
        let result = backend.create_generation(&req).await;
        self.finish(result).map(|g| Some(g.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthid_client::InMemoryBackend;

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_sending() {
        let backend = InMemoryBackend::new();
        let mut composer = Composer::new();
        composer.set_prompt("   \n");

        let err = composer
            .send(&backend, &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Invalid(_)));
        assert!(!composer.is_sending());
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn second_send_while_in_flight_is_ignored() {
        let backend = InMemoryBackend::new();
        let cfg = GenerationConfig::default();
        let mut composer = Composer::new();
        composer.set_prompt("write a haiku");

        let req = composer.begin(&cfg).unwrap().unwrap();
        assert_eq!(composer.send(&backend, &cfg).await.unwrap(), None);

        let result = backend.create_generation(&req).await;
        let gen = composer.finish(result).unwrap();
        assert_eq!(gen.output_text, "[stub:wm:on] write a haiku");
        assert_eq!(backend.count("POST", "/api/generations").await, 1);
        assert_eq!(composer.prompt(), "write a haiku");
    }

    #[tokio::test]
    async fn failure_keeps_message() {
        let backend = InMemoryBackend::new();
        backend.set_offline(true).await;
        let mut composer = Composer::new();
        composer.set_prompt("hi");

        assert!(composer.send(&backend, &GenerationConfig::default()).await.is_err());
        assert!(!composer.is_sending());
        assert!(composer.result().is_none());
        assert!(composer.last_error().unwrap().contains("connection refused"));
    }
}
