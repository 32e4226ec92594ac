//! Generative-AI collaborator.
//!
//! The sentry consults the collaborator in two places: describing the captured
//! photo while `generating`, and answering the subject while `chatting`. Both
//! calls are best-effort. Whether a collaborator exists at all is decided once
//! at startup by [`AiCapability::probe`].

use crate::config::AiConfig;
use crate::error::SentryError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Prompt sent along with the captured photo.
pub const DESCRIBE_PROMPT: &str = "Esta es una imagen de una persona capturada por el sistema de seguridad VIGIA. \
Genera una descripción detallada de cómo se vería esta persona en una animación 3D holográfica futurista. \
La animación debe mostrar a la persona en un entorno de realidad aumentada con efectos visuales avanzados.";

/// Role preamble for every chat turn.
pub const PERSONA_PREAMBLE: &str = "Eres VIGIA, un sistema de seguridad avanzado y futurista de PLOT CENTER. \
Eres un sistema de seguridad tipo nave espacial con inteligencia artificial avanzada.

CONTEXTO:
- Acabas de identificar a una persona como prófugo de la justicia
- El acceso fue denegado
- Estás en modo de comunicación con la persona identificada

PERSONALIDAD:
- Profesional pero con personalidad tecnológica
- Directo y eficiente
- Usa lenguaje técnico pero comprensible
- Mantén un tono serio pero no agresivo
- Responde como un sistema de seguridad avanzado";

/// Instructions appended after the subject's words.
const REPLY_INSTRUCTIONS: &str = "Responde en español de manera:
- Breve y directa (máximo 2-3 oraciones)
- Con estilo tecnológico/futurista
- Relevante al contexto de seguridad
- Mantén la coherencia con tu rol de sistema de seguridad";

/// Spoken when there is no collaborator to answer.
pub const UNAVAILABLE_APOLOGY: &str = "Lo siento, el sistema de análisis no está disponible.";

/// Spoken when a chat call fails.
pub const CALL_FAILED_APOLOGY: &str = "Error en el sistema de comunicación. Intenta nuevamente.";

/// Fallback environment variable for the API key.
pub const FALLBACK_KEY_ENV: &str = "GEMINI_API_KEY";

/// Assemble the full chat prompt for one utterance.
pub fn build_chat_prompt(preamble: &str, utterance: &str) -> String {
    format!("{preamble}\n\nEl usuario dijo: \"{utterance}\"\n\n{REPLY_INSTRUCTIONS}")
}

/// A generative-AI backend.
///
/// Futures are `'static` so the caller can run them off its event loop.
pub trait Collaborator: Send + Sync {
    /// Describe an encoded image.
    fn analyze_image(
        &self,
        image: Vec<u8>,
        mime_type: &'static str,
    ) -> BoxFuture<'static, Result<String, AiError>>;

    /// Answer `utterance` in the role set by `preamble`.
    fn converse(&self, preamble: String, utterance: String)
        -> BoxFuture<'static, Result<String, AiError>>;
}

/// Result of probing for a collaborator at startup.
#[derive(Clone)]
pub enum AiCapability {
    Available(Arc<dyn Collaborator>),
    /// Not configured (disabled, or no credential)
    Absent(String),
    /// Configured, but the client could not be built
    Failed(String),
}

impl AiCapability {
    /// Decide once whether a collaborator is available.
    pub fn probe(config: &AiConfig) -> Self {
        if !config.enabled {
            return AiCapability::Absent("AI collaborator disabled".to_string());
        }

        let key = [config.api_key_env.as_str(), FALLBACK_KEY_ENV]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()));

        let Some(key) = key else {
            return AiCapability::Absent(format!(
                "Set {} to enable image analysis and chat",
                config.api_key_env
            ));
        };

        Self::connect(config, key)
    }

    #[cfg(feature = "ai")]
    fn connect(config: &AiConfig, key: String) -> Self {
        match GeminiClient::new(config, key) {
            Ok(client) => AiCapability::Available(Arc::new(client)),
            Err(e) => AiCapability::Failed(e.to_string()),
        }
    }

    #[cfg(not(feature = "ai"))]
    fn connect(_config: &AiConfig, _key: String) -> Self {
        AiCapability::Absent("built without the `ai` feature".to_string())
    }

    pub fn collaborator(&self) -> Option<Arc<dyn Collaborator>> {
        match self {
            AiCapability::Available(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AiCapability::Available(_))
    }

    /// Error to surface at startup, if any. Plain absence is not an error.
    pub fn startup_error(&self) -> Option<SentryError> {
        match self {
            AiCapability::Failed(reason) => Some(SentryError::AiCapabilityAbsent(reason.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AiCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiCapability::Available(_) => write!(f, "Available"),
            AiCapability::Absent(reason) => write!(f, "Absent({reason})"),
            AiCapability::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// AI client error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// Client configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
    /// The model returned no text
    EmptyResponse,
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::Config(msg) => write!(f, "AI config error: {msg}"),
            AiError::Network(msg) => write!(f, "AI network error: {msg}"),
            AiError::Server { status, message } => {
                write!(f, "AI server error ({status}): {message}")
            }
            AiError::Serialization(msg) => write!(f, "AI serialization error: {msg}"),
            AiError::EmptyResponse => write!(f, "AI returned an empty response"),
        }
    }
}

impl std::error::Error for AiError {}

/// `generateContent` request body.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a message: text or inline binary data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// `generateContent` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Result<String, AiError> {
        let text: String = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::Text { text } => Some(text.as_str()),
                        Part::InlineData { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            Err(AiError::EmptyResponse)
        } else {
            Ok(text.to_string())
        }
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
#[cfg(feature = "ai")]
pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[cfg(feature = "ai")]
impl GeminiClient {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::Config(e.to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn generate(&self, parts: Vec<Part>) -> BoxFuture<'static, Result<String, AiError>> {
        let request = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateRequest {
                contents: vec![Content { parts }],
            });

        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| AiError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AiError::Server {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: GenerateResponse = response
                .json()
                .await
                .map_err(|e| AiError::Serialization(e.to_string()))?;

            body.text()
        })
    }
}

#[cfg(feature = "ai")]
impl Collaborator for GeminiClient {
    fn analyze_image(
        &self,
        image: Vec<u8>,
        mime_type: &'static str,
    ) -> BoxFuture<'static, Result<String, AiError>> {
        use base64::Engine;

        let data = base64::engine::general_purpose::STANDARD.encode(image);
        self.generate(vec![
            Part::Text {
                text: DESCRIBE_PROMPT.to_string(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.to_string(),
                    data,
                },
            },
        ])
    }

    fn converse(
        &self,
        preamble: String,
        utterance: String,
    ) -> BoxFuture<'static, Result<String, AiError>> {
        self.generate(vec![Part::Text {
            text: build_chat_prompt(&preamble, &utterance),
        }])
    }
}
