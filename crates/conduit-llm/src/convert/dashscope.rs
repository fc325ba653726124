//! Canonical <-> DashScope conversion

use std::collections::HashMap;

use crate::error::LlmError;
use crate::protocol::dashscope::{
    DashScopeChatRequest, DashScopeChatResponse, DashScopeChoice, DashScopeContent, DashScopeEmbeddingInput,
    DashScopeEmbeddingParameters, DashScopeEmbeddingRequest, DashScopeEmbeddingResponse, DashScopeInput,
    DashScopeMessage, DashScopeOutput, DashScopeParameters, DashScopePart, DashScopeUsage,
};
use crate::stream::LineHandler;
use crate::types::{
    CHAT_COMPLETION_CHUNK_OBJECT, CHAT_COMPLETION_OBJECT, ChatCompletionChunk, ChatCompletionRequest,
    ChatCompletionResponse, Choice, ChoiceMessage, ContentPart, EmbeddingData, EmbeddingRequest, EmbeddingResponse,
    EmbeddingUsage, FinishReason, Message, Role, StreamChoice, StreamDelta, ToolCall, Usage,
};
use crate::usage::UsageHandle;

/// Text generation endpoint, relative to the base URL
pub const TEXT_GENERATION_PATH: &str = "/api/v1/services/aigc/text-generation/generation";

/// Multimodal generation endpoint, relative to the base URL
pub const MULTIMODAL_GENERATION_PATH: &str = "/api/v1/services/aigc/multimodal-generation/generation";

/// Text embedding endpoint, relative to the base URL
pub const TEXT_EMBEDDING_PATH: &str = "/api/v1/services/embeddings/text-embedding/text-embedding";

/// Model-name marker that turns on web search
const SEARCH_SUFFIX: &str = "-internet";

/// Model families served by the multimodal endpoint
const MULTIMODAL_PREFIXES: &[&str] = &["qwen-vl", "qwen2-vl", "qwen2.5-vl", "qvq"];

// -- Model capabilities --

/// Input shape a model accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    /// Flattened string content only
    Text,
    /// Typed parts, images included
    Multimodal,
}

/// Capabilities encoded in a DashScope model name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashScopeModel {
    /// Name sent upstream, marker stripped
    pub name: String,
    pub modality: Modality,
    pub enable_search: bool,
}

impl DashScopeModel {
    /// Resolve an upstream model name such as `qwen-max-internet`
    pub fn resolve(upstream: &str) -> Self {
        let (name, enable_search) = match upstream.strip_suffix(SEARCH_SUFFIX) {
            Some(base) if !base.is_empty() => (base, true),
            _ => (upstream, false),
        };

        let modality = if MULTIMODAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
            Modality::Multimodal
        } else {
            Modality::Text
        };

        Self {
            name: name.to_owned(),
            modality,
            enable_search,
        }
    }

    /// Generation endpoint for this model
    pub const fn endpoint_path(&self) -> &'static str {
        match self.modality {
            Modality::Text => TEXT_GENERATION_PATH,
            Modality::Multimodal => MULTIMODAL_GENERATION_PATH,
        }
    }
}

// -- Outbound: canonical request -> DashScope --

/// Translate a canonical chat request for `model`
pub fn build_chat_request(request: &ChatCompletionRequest, model: &DashScopeModel) -> DashScopeChatRequest {
    let params = &request.params;

    DashScopeChatRequest {
        model: model.name.clone(),
        input: DashScopeInput {
            messages: request
                .messages
                .iter()
                .map(|message| convert_message(message, model.modality))
                .collect(),
        },
        parameters: DashScopeParameters {
            result_format: "message".to_owned(),
            incremental_output: false,
            enable_search: model.enable_search.then_some(true),
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            seed: params.seed,
            stop: params.stop.as_ref().map(|stop| stop.to_vec()),
            presence_penalty: params.presence_penalty,
            n: params.n,
            tools: request.tools.clone(),
        },
    }
}

fn convert_message(message: &Message, modality: Modality) -> DashScopeMessage {
    let content = match modality {
        Modality::Text => DashScopeContent::Text(message.text_content()),
        Modality::Multimodal => DashScopeContent::Parts(
            message
                .content_parts()
                .into_iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(DashScopePart {
                        text: Some(text),
                        image: None,
                    }),
                    ContentPart::ImageUrl { image_url } => Some(DashScopePart {
                        text: None,
                        image: Some(image_url.url),
                    }),
                    ContentPart::Unsupported => None,
                })
                .collect(),
        ),
    };

    DashScopeMessage {
        role: message.role.as_str().to_owned(),
        content,
        name: message.name.clone(),
        tool_calls: message.tool_calls.clone(),
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Translate a canonical embedding request for `model`
pub fn build_embedding_request(request: &EmbeddingRequest, model: &str) -> DashScopeEmbeddingRequest {
    DashScopeEmbeddingRequest {
        model: model.to_owned(),
        input: DashScopeEmbeddingInput {
            texts: request.input.to_vec(),
        },
        parameters: DashScopeEmbeddingParameters {
            text_type: "query".to_owned(),
        },
    }
}

// -- Inbound: DashScope response -> canonical --

/// Usage with the total derived when the vendor omits it
pub fn convert_usage(usage: &DashScopeUsage) -> Usage {
    match usage.total_tokens {
        Some(total) if total != 0 => Usage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: total,
        },
        _ => Usage::new(usage.input_tokens, usage.output_tokens),
    }
}

/// Translate a synchronous response, echoing the requested `model`
///
/// A populated vendor error short-circuits to a 400 and no response.
pub fn into_chat_response(
    response: DashScopeChatResponse,
    model: &str,
    created: u64,
) -> Result<ChatCompletionResponse, LlmError> {
    if let Some(error) = response.error.normalize() {
        return Err(LlmError::vendor(error));
    }

    let choices: Vec<Choice> = VendorChoice::collect(response.output)
        .into_iter()
        .map(|choice| Choice {
            index: choice.index,
            message: ChoiceMessage {
                role: choice.role.unwrap_or(Role::Assistant),
                content: Some(choice.text),
                tool_calls: choice.tool_calls,
            },
            finish_reason: choice.finish_reason,
        })
        .collect();

    if choices.is_empty() {
        return Err(LlmError::MalformedResponse("response carried no choices".to_owned()));
    }

    Ok(ChatCompletionResponse {
        id: response.error.request_id,
        object: CHAT_COMPLETION_OBJECT.to_owned(),
        created,
        model: model.to_owned(),
        choices,
        usage: Some(convert_usage(&response.usage)),
    })
}

/// Translate an embedding response, echoing the requested `model`
pub fn into_embedding_response(response: DashScopeEmbeddingResponse, model: &str) -> Result<EmbeddingResponse, LlmError> {
    if let Some(error) = response.error.normalize() {
        return Err(LlmError::vendor(error));
    }

    let mut data: Vec<EmbeddingData> = response
        .output
        .embeddings
        .into_iter()
        .map(|embedding| EmbeddingData {
            object: "embedding".to_owned(),
            embedding: embedding.embedding,
            index: embedding.text_index,
        })
        .collect();
    data.sort_by_key(|d| d.index);

    let tokens = response.usage.total_tokens;

    Ok(EmbeddingResponse {
        object: "list".to_owned(),
        data,
        model: model.to_owned(),
        usage: EmbeddingUsage {
            prompt_tokens: tokens,
            total_tokens: tokens,
        },
    })
}

/// Choice flattened out of either result format
struct VendorChoice {
    index: u32,
    role: Option<Role>,
    text: String,
    tool_calls: Option<Vec<ToolCall>>,
    finish_reason: Option<FinishReason>,
}

impl VendorChoice {
    /// Choices of `output`, falling back to the bare `text` result format
    fn collect(output: DashScopeOutput) -> Vec<Self> {
        let output_finish = FinishReason::from_vendor(output.finish_reason.as_deref());

        if output.choices.is_empty() {
            return output
                .text
                .map(|text| Self {
                    index: 0,
                    role: None,
                    text,
                    tool_calls: None,
                    finish_reason: output_finish,
                })
                .into_iter()
                .collect();
        }

        output
            .choices
            .into_iter()
            .enumerate()
            .map(|(position, choice)| Self::from_choice(choice, position, output_finish.as_ref()))
            .collect()
    }

    fn from_choice(choice: DashScopeChoice, position: usize, output_finish: Option<&FinishReason>) -> Self {
        let DashScopeChoice {
            index,
            finish_reason,
            message,
        } = choice;

        Self {
            index: index.unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX)),
            role: message.role.as_deref().map(vendor_role),
            text: message.content.as_ref().map(DashScopeContent::text).unwrap_or_default(),
            tool_calls: message.tool_calls,
            finish_reason: FinishReason::from_vendor(finish_reason.as_deref()).or_else(|| output_finish.cloned()),
        }
    }
}

fn vendor_role(raw: &str) -> Role {
    match raw {
        "system" => Role::System,
        "user" => Role::User,
        "tool" => Role::Tool,
        _ => Role::Assistant,
    }
}

// -- Stream conversion --

/// Last cumulative text seen per choice index
///
/// Built fresh for every stream and dropped with it.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    last: HashMap<u32, String>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `index` has produced a delta yet
    pub fn is_tracking(&self, index: u32) -> bool {
        self.last.contains_key(&index)
    }

    /// Text added to `index` since the previous call, storing `cumulative`
    ///
    /// An empty `cumulative` (terminal events) yields an empty delta and keeps
    /// the stored text. Text that does not extend the stored value is emitted
    /// whole and replaces it.
    pub fn delta(&mut self, index: u32, cumulative: &str) -> String {
        let previous = self.last.entry(index).or_default();
        if cumulative.is_empty() {
            return String::new();
        }

        let delta = cumulative
            .strip_prefix(previous.as_str())
            .unwrap_or(cumulative)
            .to_owned();

        cumulative.clone_into(previous);
        delta
    }
}

/// Per-stream handler for DashScope cumulative events
pub struct DashScopeStreamHandler {
    model: String,
    created: u64,
    usage: UsageHandle,
    deltas: DeltaTracker,
    finished: bool,
}

impl DashScopeStreamHandler {
    /// Handler echoing `model` and writing usage into `usage`
    pub fn new(model: impl Into<String>, created: u64, usage: UsageHandle) -> Self {
        Self {
            model: model.into(),
            created,
            usage,
            deltas: DeltaTracker::new(),
            finished: false,
        }
    }
}

impl LineHandler for DashScopeStreamHandler {
    fn handle_line(&mut self, payload: &[u8]) -> Result<Vec<ChatCompletionChunk>, LlmError> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }

        let response: DashScopeChatResponse = serde_json::from_slice(payload).map_err(|e| {
            tracing::error!(provider = "ali", error = %e, "failed to decode stream event");
            LlmError::MalformedResponse(e.to_string())
        })?;

        if let Some(error) = response.error.normalize() {
            return Err(LlmError::vendor(error));
        }

        if response.usage.output_tokens != 0 {
            self.usage.overwrite(convert_usage(&response.usage));
        }

        let choices: Vec<StreamChoice> = VendorChoice::collect(response.output)
            .into_iter()
            .map(|choice| {
                let first = !self.deltas.is_tracking(choice.index);
                let content = self.deltas.delta(choice.index, &choice.text);
                let terminal = choice.finish_reason.is_some();
                self.finished |= terminal;

                StreamChoice {
                    index: choice.index,
                    delta: StreamDelta {
                        role: first.then(|| choice.role.unwrap_or(Role::Assistant)),
                        content: Some(content),
                        // Cumulative events repeat the full call list; forward it once
                        tool_calls: choice.tool_calls.filter(|_| terminal),
                    },
                    finish_reason: choice.finish_reason,
                }
            })
            .collect();

        if choices.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![ChatCompletionChunk {
            id: response.error.request_id,
            object: CHAT_COMPLETION_CHUNK_OBJECT.to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices,
            usage: None,
        }])
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
