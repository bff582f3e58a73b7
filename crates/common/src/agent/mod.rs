//! Agent loop
//!
//! Runs one chat turn: the utterance and the tool catalogue go to a
//! reasoning provider, the tools it picks are executed against the
//! snapshot, results are fed back, and the provider's final text is
//! returned with the chart of the last charted tool call.
//!
//! ```text
//! AwaitingInput -> Reasoning -> (ToolCall -> Reasoning)* -> Responding -> AwaitingInput
//! ```
//!
//! The reasoning call is the only suspension point. Each call is bounded by
//! a timeout and retried a bounded number of times on retryable failures;
//! the whole turn is bounded by the turn timeout and the iteration cap.

mod anthropic;
mod offline;

pub use anthropic::AnthropicProvider;
pub use offline::OfflineProvider;

use crate::config::{AgentConfig, LlmConfig};
use crate::errors::{AppError, Result};
use crate::tools::{ChartSpec, ToolDefinition, ToolRegistry};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SYSTEM_PROMPT: &str = "You are a data analysis assistant for a research citation dataset \
(papers, citations, authors and co-authorship).

Use the provided tools to answer questions; never invent numbers. Call the tool that \
matches the question, read its result, then answer concisely with the specific figures \
it returned. If a tool reports an argument error, correct the arguments and try again.

Charts are attached to your answer automatically from tool results, so do not write \
chart specifications yourself.";

/// A tool invocation chosen by the reasoning provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: &str, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            arguments,
        }
    }
}

/// One step of the turn transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    User {
        text: String,
    },
    AssistantToolCalls {
        preamble: Option<String>,
        calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        tool: String,
        is_error: bool,
        content: Value,
    },
    AssistantText {
        text: String,
    },
}

/// Everything the reasoning provider sees for one decision
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub system: String,
    pub tools: Vec<ToolDefinition>,
    pub transcript: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningDecision {
    CallTools {
        preamble: Option<String>,
        calls: Vec<ToolCall>,
    },
    Respond {
        text: String,
    },
}

/// External language-reasoning capability
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Decide the next step given the transcript so far
    async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningDecision>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a reasoning provider from config.
///
/// Falls back to the offline router when no API key is configured.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn ReasoningProvider> {
    match config.provider.as_str() {
        "anthropic" if config.has_api_key() => match AnthropicProvider::new(config) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                warn!(error = %e, "Failed to create Anthropic provider, using offline router");
                Arc::new(OfflineProvider::new())
            }
        },
        "anthropic" => {
            warn!("No LLM API key configured, using offline router");
            Arc::new(OfflineProvider::new())
        }
        "offline" => Arc::new(OfflineProvider::new()),
        other => {
            warn!(provider = other, "Unknown LLM provider, using offline router");
            Arc::new(OfflineProvider::new())
        }
    }
}

/// Per-turn state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingInput,
    Reasoning { iteration: usize },
    ToolCall { iteration: usize, calls: usize },
    Responding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    IterationLimit,
    UpstreamTimeout,
    UpstreamError,
    Failed,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Completed => "completed",
            TurnOutcome::IterationLimit => "iteration_limit",
            TurnOutcome::UpstreamTimeout => "upstream_timeout",
            TurnOutcome::UpstreamError => "upstream_error",
            TurnOutcome::Failed => "failed",
        }
    }
}

/// A tool call made during the turn, as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub arguments: Value,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub chart_spec: Option<ChartSpec>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub outcome: TurnOutcome,
    /// Reasoning calls made
    pub iterations: usize,
}

/// What a turn accumulated, kept even when the turn fails
#[derive(Debug, Default)]
struct TurnProgress {
    chart_spec: Option<ChartSpec>,
    tool_calls: Vec<ToolCallRecord>,
    iterations: usize,
}

impl TurnProgress {
    fn into_response(self, text: String, outcome: TurnOutcome) -> ChatResponse {
        ChatResponse {
            text,
            chart_spec: self.chart_spec,
            tool_calls: self.tool_calls,
            outcome,
            iterations: self.iterations,
        }
    }
}

pub struct AgentLoop {
    provider: Arc<dyn ReasoningProvider>,
    tools: Arc<ToolRegistry>,
    agent: AgentConfig,
    llm: LlmConfig,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        tools: Arc<ToolRegistry>,
        agent: AgentConfig,
        llm: LlmConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            agent,
            llm,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Run one turn, surfacing every failure as an error
    pub async fn run_turn(&self, utterance: &str) -> Result<ChatResponse> {
        let utterance = validate_utterance(utterance)?;
        let started = Instant::now();
        let mut progress = TurnProgress::default();

        match self.run_inner(utterance, &mut progress).await {
            Ok(text) => {
                crate::metrics::record_turn(TurnOutcome::Completed.as_str(), progress.iterations, started.elapsed());
                Ok(progress.into_response(text, TurnOutcome::Completed))
            }
            Err(e) => {
                crate::metrics::record_turn(outcome_for(&e).as_str(), progress.iterations, started.elapsed());
                Err(e)
            }
        }
    }

    /// Run one turn under the turn timeout.
    ///
    /// Upstream failures, timeouts and the iteration cap produce a degraded
    /// response carrying whatever chart was obtained; only an invalid
    /// utterance is returned as an error.
    pub async fn chat(&self, utterance: &str) -> Result<ChatResponse> {
        let utterance = validate_utterance(utterance)?;
        let started = Instant::now();
        let mut progress = TurnProgress::default();

        let result = tokio::time::timeout(
            self.agent.turn_timeout(),
            self.run_inner(utterance, &mut progress),
        )
        .await;

        let (text, outcome) = match result {
            Ok(Ok(text)) => (text, TurnOutcome::Completed),
            Ok(Err(e @ AppError::InvalidRequest { .. })) => return Err(e),
            Ok(Err(e)) => {
                let outcome = outcome_for(&e);
                warn!(error = %e, outcome = outcome.as_str(), iterations = progress.iterations, "Chat turn degraded");
                (degraded_text(outcome, &e, &progress), outcome)
            }
            Err(_) => {
                let e = AppError::UpstreamTimeout {
                    timeout_ms: self.agent.turn_timeout().as_millis() as u64,
                };
                warn!(error = %e, iterations = progress.iterations, "Chat turn timed out");
                (degraded_text(TurnOutcome::UpstreamTimeout, &e, &progress), TurnOutcome::UpstreamTimeout)
            }
        };

        crate::metrics::record_turn(outcome.as_str(), progress.iterations, started.elapsed());
        info!(
            outcome = outcome.as_str(),
            iterations = progress.iterations,
            tool_calls = progress.tool_calls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chat turn finished"
        );

        Ok(progress.into_response(text, outcome))
    }

    async fn run_inner(&self, utterance: &str, progress: &mut TurnProgress) -> Result<String> {
        let turn_id = Uuid::new_v4();
        let mut state = TurnState::AwaitingInput;
        let mut request = ReasoningRequest {
            system: SYSTEM_PROMPT.to_string(),
            tools: self.tools.definitions(),
            transcript: vec![TranscriptEntry::User {
                text: utterance.to_string(),
            }],
        };
        let mut tool_rounds = 0;

        loop {
            progress.iterations += 1;
            transition(&turn_id, &mut state, TurnState::Reasoning { iteration: progress.iterations });

            let (preamble, calls) = match self.reason_with_retry(&request).await? {
                ReasoningDecision::Respond { text } => {
                    transition(&turn_id, &mut state, TurnState::Responding);
                    request.transcript.push(TranscriptEntry::AssistantText { text: text.clone() });
                    transition(&turn_id, &mut state, TurnState::AwaitingInput);
                    return Ok(text);
                }
                // A tool request without calls is a final answer
                ReasoningDecision::CallTools { preamble, calls } if calls.is_empty() => {
                    transition(&turn_id, &mut state, TurnState::Responding);
                    transition(&turn_id, &mut state, TurnState::AwaitingInput);
                    return Ok(preamble.unwrap_or_default());
                }
                ReasoningDecision::CallTools { preamble, calls } => (preamble, calls),
            };

            if tool_rounds == self.agent.max_iterations {
                return Err(AppError::AgentLoopExceeded {
                    max_iterations: self.agent.max_iterations,
                });
            }
            tool_rounds += 1;

            transition(
                &turn_id,
                &mut state,
                TurnState::ToolCall {
                    iteration: progress.iterations,
                    calls: calls.len(),
                },
            );

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let outcome = self.tools.invoke(&call.name, call.arguments.clone());
                debug!(
                    turn = %turn_id,
                    tool = %call.name,
                    is_error = outcome.is_error,
                    "Tool call finished"
                );

                if let Some(chart) = &outcome.chart_spec {
                    progress.chart_spec = Some(chart.clone());
                }
                progress.tool_calls.push(ToolCallRecord {
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                    is_error: outcome.is_error,
                });
                results.push(TranscriptEntry::ToolResult {
                    call_id: call.id.clone(),
                    tool: call.name.clone(),
                    is_error: outcome.is_error,
                    content: outcome.payload,
                });
            }

            request.transcript.push(TranscriptEntry::AssistantToolCalls { preamble, calls });
            request.transcript.extend(results);
        }
    }

    /// One reasoning decision with per-call timeout and bounded retries
    async fn reason_with_retry(&self, request: &ReasoningRequest) -> Result<ReasoningDecision> {
        let timeout = self.llm.timeout();
        let model = self.provider.model_name().to_string();
        let mut schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.llm.initial_backoff_ms))
            .with_multiplier(2.0)
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(None)
            .build();

        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            let result = match tokio::time::timeout(timeout, self.provider.reason(request)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::UpstreamTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            crate::metrics::record_reasoning(&model, started.elapsed(), result.is_ok());

            match result {
                Ok(decision) => return Ok(decision),
                Err(e) if e.is_retryable() && attempt < self.llm.max_retries => {
                    attempt += 1;
                    let delay = schedule
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_millis(self.llm.initial_backoff_ms));
                    warn!(
                        attempt,
                        max_retries = self.llm.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Reasoning call failed, retrying"
                    );
                    crate::metrics::record_reasoning_retry(&model);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn validate_utterance(utterance: &str) -> Result<&str> {
    let trimmed = utterance.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_field("message", "message must not be empty"));
    }
    Ok(trimmed)
}

fn transition(turn_id: &Uuid, state: &mut TurnState, next: TurnState) {
    debug!(turn = %turn_id, from = ?state, to = ?next, "Agent state transition");
    *state = next;
}

fn outcome_for(error: &AppError) -> TurnOutcome {
    match error {
        AppError::AgentLoopExceeded { .. } => TurnOutcome::IterationLimit,
        AppError::UpstreamTimeout { .. } => TurnOutcome::UpstreamTimeout,
        AppError::Upstream { .. } => TurnOutcome::UpstreamError,
        _ => TurnOutcome::Failed,
    }
}

fn degraded_text(outcome: TurnOutcome, error: &AppError, progress: &TurnProgress) -> String {
    let mut text = match outcome {
        TurnOutcome::IterationLimit => format!(
            "I could not finish this analysis within the allowed number of steps ({}).",
            match error {
                AppError::AgentLoopExceeded { max_iterations } => *max_iterations,
                _ => 0,
            }
        ),
        TurnOutcome::UpstreamTimeout => {
            "Unable to complete analysis right now: the reasoning service did not answer in time.".to_string()
        }
        _ => "Unable to complete analysis right now. Please try again shortly.".to_string(),
    };

    let succeeded = progress.tool_calls.iter().filter(|c| !c.is_error).count();
    if succeeded > 0 {
        text.push_str(&format!(
            " {} quer{} completed before stopping",
            succeeded,
            if succeeded == 1 { "y" } else { "ies" }
        ));
        if progress.chart_spec.is_some() {
            text.push_str("; the latest chart is attached");
        }
        text.push('.');
    }
    text
}
