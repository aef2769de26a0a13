//! LLM-backed oracle
//!
//! Talks to an OpenAI-compatible chat completion server (vLLM, llama.cpp,
//! etc.). The prompt carries the region's size, level and current tiles;
//! the reply must contain a JSON grid which is parsed and size-checked.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{parse_tile_matrix, Oracle, OracleResult, RegionDescription};
use crate::tiles::TileMatrix;

/// Configuration for the LLM server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the LLM server (e.g., "http://localhost:8000")
    pub base_url: String,
    /// Model name to use (optional, server may have default)
    pub model: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature for generation (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Human-readable names for tile indices, shown to the model
    pub tile_legend: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            model: None,
            max_tokens: 2048,
            temperature: 0.4,
            timeout_secs: 120,
            tile_legend: Vec::new(),
        }
    }
}

/// OpenAI-compatible chat message
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessageResponse,
}

/// Response message - handles both standard and reasoning models
#[derive(Deserialize, Debug)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

impl ChatMessageResponse {
    fn get_content(&self) -> Option<String> {
        self.content
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.reasoning_content.clone())
    }
}

/// Why a completion request produced no usable text.
#[derive(Debug)]
pub enum LlmError {
    /// Connection, timeout or body decoding failure.
    Transport(reqwest::Error),
    /// Server answered with a non-success status.
    Status { code: u16, body: String },
    /// No choice carried any content.
    EmptyReply,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Transport(e) => write!(f, "transport error: {}", e),
            LlmError::Status { code, body } => write!(f, "server returned {}: {}", code, body),
            LlmError::EmptyReply => write!(f, "empty reply"),
        }
    }
}

impl std::error::Error for LlmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LlmError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Transport(e)
    }
}

pub struct LlmOracle {
    config: LlmConfig,
    client: reqwest::blocking::Client,
}

impl LlmOracle {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Whether the server lists its models.
    pub fn health_check(&self) -> bool {
        match self.client.get(self.endpoint("v1/models")).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("llm: health check failed: {}", e);
                false
            }
        }
    }

    fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint("v1/chat/completions"))
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status {
                code: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let completion: ChatCompletionResponse = response.json()?;
        completion
            .choices
            .iter()
            .find_map(|c| c.message.get_content())
            .ok_or(LlmError::EmptyReply)
    }
}

impl Oracle for LlmOracle {
    fn generate(&self, description: &RegionDescription) -> OracleResult {
        let messages = build_messages(description, &self.config.tile_legend);
        match self.complete(messages) {
            Ok(reply) => {
                debug!("llm: {} byte reply for {:?}", reply.len(), description.bounds);
                parse_tile_matrix(&reply, description.expected_dimensions())
            }
            Err(e) => {
                warn!("llm: request for {:?} failed: {}", description.bounds, e);
                OracleResult::OracleError(e.to_string())
            }
        }
    }
}

const SYSTEM_PROMPT: &str = r#"You are a level designer editing a 2D tile map.
You receive a rectangular region as a JSON grid of tile indices (null = empty).
Reply with ONLY a JSON array of rows of the same width and height.
Each entry is a non-negative integer tile index or null."#;

/// System + user messages describing one region.
pub fn build_messages(description: &RegionDescription, legend: &[String]) -> Vec<ChatMessage> {
    let (width, height) = description.expected_dimensions();

    let mut user = format!(
        "Region: {} columns x {} rows at ({}, {}), layer z={}.\n",
        width, height, description.bounds.x0, description.bounds.y0, description.level
    );
    if !legend.is_empty() {
        user.push_str("Tiles:\n");
        for (i, name) in legend.iter().enumerate() {
            user.push_str(&format!("  {} = {}\n", i, name));
        }
    }
    user.push_str("Current tiles:\n");
    user.push_str(&grid_json(&description.prior));
    user.push('\n');
    if description.prompt.is_empty() {
        user.push_str("Regenerate this region so it fits its surroundings.");
    } else {
        user.push_str(&format!("Instruction: {}", description.prompt));
    }

    vec![
        ChatMessage {
            role: "system".to_string(),
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: user,
        },
    ]
}

fn grid_json(matrix: &TileMatrix) -> String {
    let rows: Vec<Vec<Option<u32>>> = matrix.rows().map(|r| r.to_vec()).collect();
    serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
}
