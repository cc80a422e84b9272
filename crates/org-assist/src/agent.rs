//! Bounded tool-calling agent loop.
//!
//! ```text
//! AwaitingModel ──no tool calls──▶ Terminated(answer)
//!      │  ▲
//!      ▼  │ results appended, iteration += 1
//! ExecutingTools
//! ```
//!
//! Each model round that requests tools counts as one iteration. When the
//! counter reaches `max_iterations` before the model answers in plain text,
//! the run ends with `MAX_ITERATIONS_REACHED`. Tool problems (unknown or
//! unbound name, bad arguments, remote failure, timeout) never end the run:
//! they come back to the model as an error tool result. Model failures and
//! cancellation end it with an [`EngineError`].
//!
//! All tool calls of one round run concurrently and are joined before the
//! next model call.

use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use org_assist_core::actions::{tool_specs, Action, ActionGateway, ActionResult, ToolCategory};
use org_assist_core::chat::{ChatMessage, ChatModel, ChatResponse, ToolCall, ToolSpec};
use org_assist_core::error::EngineError;
use org_assist_core::models::{ConversationTurn, Identity};

use crate::rag::history_messages;

/// How a run that produced an answer ended.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub success: bool,
    /// Tools that were actually executed, in call order, repeats included.
    pub tools_used: Vec<String>,
    pub iterations: usize,
    /// Set when `success` is false.
    pub code: Option<&'static str>,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(ChatResponse),
    Terminated(AgentOutcome),
}

/// Result of one tool call.
struct ToolRun {
    call_id: String,
    executed: Option<&'static str>,
    result: ActionResult,
}

pub struct AgentOrchestrator {
    chat: Arc<dyn ChatModel>,
    gateway: Arc<dyn ActionGateway>,
    max_iterations: usize,
    tool_timeout: Duration,
}

impl AgentOrchestrator {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        gateway: Arc<dyn ActionGateway>,
        max_iterations: usize,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            chat,
            gateway,
            max_iterations,
            tool_timeout,
        }
    }

    pub async fn run(
        &self,
        identity: &Identity,
        message: &str,
        history: &[ConversationTurn],
        enabled: Option<&[ToolCategory]>,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, EngineError> {
        let tools = tool_specs(enabled);
        let bound: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();

        let mut transcript = vec![ChatMessage::system(system_prompt(identity, &tools))];
        transcript.extend(history_messages(history));
        transcript.push(ChatMessage::user(message));

        let mut iterations = 0;
        let mut tools_used = Vec::new();
        let mut state = LoopState::AwaitingModel;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(iterations, "agent run cancelled");
                return Err(EngineError::Cancelled);
            }

            state = match state {
                LoopState::AwaitingModel if iterations >= self.max_iterations => {
                    tracing::warn!(iterations, "agent run hit the iteration limit");
                    LoopState::Terminated(AgentOutcome {
                        answer: format!(
                            "I couldn't finish this request within {} steps. \
                             Some actions may have completed; please check before retrying.",
                            self.max_iterations
                        ),
                        success: false,
                        tools_used: std::mem::take(&mut tools_used),
                        iterations,
                        code: Some(EngineError::MaxIterationsExceeded(self.max_iterations).code()),
                    })
                }
                LoopState::AwaitingModel => {
                    let invoked = tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        r = self.chat.invoke(&transcript, &tools) => r,
                    };
                    let response = invoked.map_err(|e| {
                        EngineError::ModelInvocationFailure(EngineError::describe(&e))
                    })?;

                    if response.tool_calls.is_empty() {
                        LoopState::Terminated(AgentOutcome {
                            answer: response.text,
                            success: true,
                            tools_used: std::mem::take(&mut tools_used),
                            iterations,
                            code: None,
                        })
                    } else {
                        LoopState::ExecutingTools(response)
                    }
                }
                LoopState::ExecutingTools(response) => {
                    iterations += 1;
                    let runs = tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        runs = join_all(
                            response
                                .tool_calls
                                .iter()
                                .map(|call| self.run_tool(identity, call, &bound, iterations)),
                        ) => runs,
                    };

                    transcript.push(ChatMessage::Assistant {
                        content: response.text,
                        tool_calls: response.tool_calls,
                    });
                    for run in runs {
                        if let Some(name) = run.executed {
                            tools_used.push(name.to_string());
                        }
                        transcript.push(ChatMessage::tool_result(run.call_id, run.result.to_message()));
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Terminated(outcome) => {
                    tracing::info!(
                        iterations = outcome.iterations,
                        tools = outcome.tools_used.len(),
                        success = outcome.success,
                        "agent run finished"
                    );
                    return Ok(outcome);
                }
            };
        }
    }

    async fn run_tool(
        &self,
        identity: &Identity,
        call: &ToolCall,
        bound: &HashSet<&str>,
        iteration: usize,
    ) -> ToolRun {
        let rejected = |result: ActionResult| ToolRun {
            call_id: call.id.clone(),
            executed: None,
            result,
        };

        if !bound.contains(call.name.as_str()) {
            tracing::warn!(iteration, tool = %call.name, "model called an unavailable tool");
            return rejected(ActionResult::err(
                EngineError::ToolNotFound(call.name.clone()).to_string(),
            ));
        }

        let action = match Action::decode(&call.name, call.arguments.clone()) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(iteration, tool = %call.name, error = %e, "rejected tool arguments");
                return rejected(ActionResult::err(e.to_string()));
            }
        };
        let name = action.name();

        let result = match tokio::time::timeout(
            self.tool_timeout,
            self.gateway.execute(identity, action),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => ActionResult::err(format!(
                "{} timed out after {}s",
                name,
                self.tool_timeout.as_secs()
            )),
        };

        if result.success {
            tracing::info!(iteration, tool = name, "tool succeeded");
        } else {
            let failure = EngineError::ToolExecutionFailure {
                tool: name.to_string(),
                message: result.error.clone().unwrap_or_default(),
            };
            tracing::warn!(iteration, tool = name, error = %failure, "tool failed");
        }

        ToolRun {
            call_id: call.id.clone(),
            executed: Some(name),
            result,
        }
    }
}

fn system_prompt(identity: &Identity, tools: &[ToolSpec]) -> String {
    let catalog = if tools.is_empty() {
        "(no tools are available for this request)".to_string()
    } else {
        tools
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let identity_json = json!({
        "organizationId": identity.organization_id,
        "userId": identity.user_id,
    });

    format!(
        "You are the operations assistant for organization {org}.\n\
         You act on behalf of this caller: {identity}\n\
         Use the tools below to carry out the user's request. Only use ids that \
         the user gave you or that a previous tool result returned. When the work \
         is done, reply in plain text and mention the ids of anything you created \
         or changed. If a tool returns an error, explain it or try a corrected call.\n\n\
         Tools:\n{catalog}",
        org = identity.organization_id,
        identity = identity_json,
        catalog = catalog,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use org_assist_core::actions::{ActionData, Record};
    use serde_json::Value;
    use std::sync::Mutex;

    /// Replays scripted responses; records every transcript it was given.
    struct Scripted {
        responses: Mutex<Vec<ChatResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(mut responses: Vec<ChatResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn invoke(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| ChatResponse::text("done")))
        }
    }

    struct Echo;

    #[async_trait]
    impl ActionGateway for Echo {
        async fn execute(&self, _identity: &Identity, action: Action) -> ActionResult {
            ActionResult::ok(ActionData::Record(Record {
                id: format!("{}-1", action.name()),
                fields: Default::default(),
            }))
        }
    }

    fn who() -> Identity {
        Identity {
            organization_id: "org1".into(),
            user_id: "u1".into(),
        }
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }
    }

    fn agent(chat: Arc<Scripted>) -> AgentOrchestrator {
        AgentOrchestrator::new(chat, Arc::new(Echo), 5, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_unbound_tool_is_reported_not_executed() {
        let chat = Arc::new(Scripted::new(vec![
            ChatResponse::calls(vec![call("c1", "list_clients", json!({}))]),
            ChatResponse::text("Client tools are not enabled."),
        ]));
        let outcome = agent(chat.clone())
            .run(
                &who(),
                "add a client",
                &[],
                Some(&[ToolCategory::Projects][..]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.tools_used.is_empty());
        assert_eq!(outcome.iterations, 1);

        let seen = chat.seen.lock().unwrap();
        let Some(ChatMessage::Tool { content, .. }) = seen[1].last() else {
            panic!("expected a tool result");
        };
        assert!(content.contains("tool not found: list_clients"));
    }

    #[tokio::test]
    async fn test_parallel_calls_are_all_answered() {
        let chat = Arc::new(Scripted::new(vec![
            ChatResponse::calls(vec![
                call("a", "get_project", json!({"id": "P1"})),
                call("b", "get_client", json!({"id": "C1"})),
            ]),
            ChatResponse::text("Both found."),
        ]));
        let outcome = agent(chat.clone())
            .run(&who(), "update things", &[], None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.tools_used, vec!["get_project", "get_client"]);
        let seen = chat.seen.lock().unwrap();
        let ids: Vec<_> = seen[1]
            .iter()
            .filter_map(|m| match m {
                ChatMessage::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_bad_arguments_feed_back_an_error() {
        let chat = Arc::new(Scripted::new(vec![
            ChatResponse::calls(vec![call("c1", "create_task", json!({"title": "x"}))]),
            ChatResponse::text("I need a project id."),
        ]));
        let outcome = agent(chat.clone())
            .run(&who(), "create a task", &[], None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.tools_used.is_empty());

        let seen = chat.seen.lock().unwrap();
        let Some(ChatMessage::Tool { content, .. }) = seen[1].last() else {
            panic!("expected a tool result");
        };
        assert!(content.contains("invalid arguments for create_task"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let chat = Arc::new(Scripted::new(vec![]));
        let token = CancellationToken::new();
        token.cancel();
        let err = agent(chat.clone())
            .run(&who(), "create a task", &[], None, &token)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
        assert!(chat.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_prompt_lists_bound_tools() {
        let tools = tool_specs(Some(&[ToolCategory::Notifications][..]));
        let prompt = system_prompt(&who(), &tools);
        assert!(prompt.contains("organization org1"));
        assert!(prompt.contains("\"userId\":\"u1\""));
        assert!(prompt.contains("- send_notification:"));
        assert!(!prompt.contains("create_task"));
    }
}
