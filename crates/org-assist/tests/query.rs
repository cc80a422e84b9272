//! End-to-end query behavior over in-memory stores and scripted providers.

mod common;

use common::*;
use org_assist::engine::QueryRequest;
use org_assist_core::actions::params::CreateTask;
use org_assist_core::actions::{Action, ActionResult};
use org_assist_core::chat::{ChatMessage, ChatResponse};
use org_assist_core::models::{Role, OVERVIEW_CONTENT_TYPE};
use org_assist_core::scope::REFUSAL;
use org_assist_core::store::ConversationStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn request(query: &str, session: Option<&str>) -> QueryRequest {
    QueryRequest {
        organization_id: "org1".into(),
        user_id: "u1".into(),
        session_id: session.map(str::to_string),
        query: query.into(),
        enabled_tool_categories: None,
    }
}

// ─── Scope gate ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_blocked_query_never_reaches_retrieval_or_model() {
    let h = harness(ScriptedChat::new(vec![]), FakeGateway::default());

    let response = h
        .ctx
        .engine
        .query(
            &request("Should we invest our cash in bitcoin?", Some("s1")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.is_out_of_scope);
    assert_eq!(response.answer, REFUSAL);
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.chat.calls(), 0);
    assert!(h.gateway.executed().is_empty());

    let turns = h.conversations.history("s1", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, REFUSAL);
    assert_eq!(turns[1].metadata["outOfScope"], true);
}

// ─── Agent loop ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_endless_tool_calls_stop_at_max_iterations() {
    let h = harness(
        ScriptedChat::repeating(ChatResponse::calls(vec![tool_call(
            "c",
            "list_projects",
            json!({}),
        )])),
        FakeGateway::default(),
    );

    let response = h
        .ctx
        .engine
        .query(&request("Create a plan for every project", None), &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.is_action_response);
    let action = response.action_result.expect("action summary");
    assert!(!action.success);
    assert_eq!(action.code.as_deref(), Some("MAX_ITERATIONS_REACHED"));
    assert_eq!(action.iterations, 5);
    assert_eq!(action.tools_used.len(), 5);
    assert_eq!(h.chat.calls(), 5);
    assert!(response.error.is_none());
}

#[tokio::test]
async fn test_tool_failure_then_success_is_recovered() {
    let create = || {
        ChatResponse::calls(vec![tool_call(
            "c",
            "create_task",
            json!({ "projectId": "P1", "title": "Write release notes" }),
        )])
    };
    let h = harness(
        ScriptedChat::new(vec![create(), create(), ChatResponse::text("Created task T9.")]),
        FakeGateway::new(vec![
            ActionResult::err("project service returned 503 Service Unavailable: busy"),
            record("T9"),
        ]),
    );

    let response = h
        .ctx
        .engine
        .query(&request("Create a task for the release notes in P1", None), &CancellationToken::new())
        .await
        .unwrap();

    let action = response.action_result.expect("action summary");
    assert!(action.success);
    assert_eq!(action.tools_used, vec!["create_task", "create_task"]);
    assert_eq!(action.iterations, 2);
    assert_eq!(response.answer, "Created task T9.");

    // The failure was fed back to the model before its retry.
    let second = h.chat.transcript(1);
    let Some(ChatMessage::Tool { content, .. }) = second.last() else {
        panic!("expected a tool result");
    };
    assert!(content.contains("503"));
}

#[tokio::test]
async fn test_create_task_scenario() {
    let h = harness(
        ScriptedChat::new(vec![
            ChatResponse::calls(vec![tool_call(
                "call_1",
                "create_task",
                json!({ "projectId": "P1", "title": "Fix login bug" }),
            )]),
            ChatResponse::text("Done: created task T1 \"Fix login bug\" in project P1."),
        ]),
        FakeGateway::new(vec![record("T1")]),
    );

    let response = h
        .ctx
        .engine
        .query(
            &request("Create a task called Fix login bug in project P1", Some("s-b")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let executed = h.gateway.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].0, who());
    assert_eq!(
        executed[0].1,
        Action::CreateTask(CreateTask {
            project_id: "P1".into(),
            title: "Fix login bug".into(),
            ..Default::default()
        })
    );

    assert!(response.is_action_response);
    assert!(response.answer.contains("T1"));
    let action = response.action_result.expect("action summary");
    assert!(action.success);
    assert_eq!(action.tools_used, vec!["create_task"]);

    let second = h.chat.transcript(1);
    let Some(ChatMessage::Tool {
        tool_call_id,
        content,
    }) = second.last()
    else {
        panic!("expected a tool result");
    };
    assert_eq!(tool_call_id, "call_1");
    assert!(content.contains("\"id\":\"T1\""));

    let turns = h.conversations.history("s-b", 10).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].metadata["toolsUsed"], json!(["create_task"]));
}

#[tokio::test]
async fn test_disabled_categories_hide_tools() {
    let h = harness(
        ScriptedChat::new(vec![
            ChatResponse::calls(vec![tool_call(
                "c",
                "create_task",
                json!({ "projectId": "P1", "title": "x" }),
            )]),
            ChatResponse::text("Project tools are not available."),
        ]),
        FakeGateway::default(),
    );
    let mut req = request("Create a task in P1", None);
    req.enabled_tool_categories = Some(vec!["communication".into()]);

    let response = h
        .ctx
        .engine
        .query(&req, &CancellationToken::new())
        .await
        .unwrap();

    assert!(h.gateway.executed().is_empty());
    let action = response.action_result.expect("action summary");
    assert!(action.success);
    assert!(action.tools_used.is_empty());
    assert!(system_text(&h.chat.transcript(0)).contains("send_message"));
    assert!(!system_text(&h.chat.transcript(0)).contains("create_task"));
}

// ─── RAG ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_aggregate_question_gets_overview_context() {
    let h = harness(
        ScriptedChat::new(vec![ChatResponse::text("You have 3 clients.")]),
        FakeGateway::default(),
    );

    let outcome = h
        .ctx
        .indexing
        .index_documents(&[
            doc("org1", "clients", "c1", "Acme Corp", "Long-running retail account, renewal due in May."),
            doc("org1", "clients", "c2", "Globex", "Energy sector client with two active projects."),
            doc("org1", "clients", "c3", "Initech", "Software vendor; paused engagement."),
            doc("org1", "wiki_pages", "w1", "Onboarding", "How we onboard new clients step by step."),
        ])
        .await;
    assert!(outcome.errors.is_empty());

    let response = h
        .ctx
        .engine
        .query(&request("How many clients do I have?", None), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!response.is_action_response);
    assert!(!response.is_out_of_scope);
    assert_eq!(response.answer, "You have 3 clients.");
    assert_eq!(response.sources[0].content_type, OVERVIEW_CONTENT_TYPE);

    let system = system_text(&h.chat.transcript(0));
    assert!(system.contains("Number of client records: 3"));
    assert!(system.contains("Organization Overview"));
}

#[tokio::test]
async fn test_history_is_replayed_on_the_next_turn() {
    let h = harness(
        ScriptedChat::new(vec![
            ChatResponse::text("Acme renews in May."),
            ChatResponse::text("It is a retail account."),
        ]),
        FakeGateway::default(),
    );
    h.ctx
        .indexing
        .index_document(&doc("org1", "clients", "c1", "Acme Corp", "Retail account, renewal due in May."))
        .await
        .unwrap();

    let first = h
        .ctx
        .engine
        .query(&request("When does Acme renew?", None), &CancellationToken::new())
        .await
        .unwrap();
    h.ctx
        .engine
        .query(
            &request("What kind of account is it?", Some(&first.session_id)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let second = h.chat.transcript(1);
    assert_eq!(second[1], ChatMessage::user("When does Acme renew?"));
    assert_eq!(second[2], ChatMessage::assistant("Acme renews in May."));
    assert_eq!(second[3], ChatMessage::user("What kind of account is it?"));

    let turns = h.conversations.history(&first.session_id, 10).await.unwrap();
    let roles: Vec<_> = turns.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
}

// ─── Failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_model_failure_keeps_only_the_user_turn() {
    let h = harness(ScriptedChat::failing("connection reset"), FakeGateway::default());

    let response = h
        .ctx
        .engine
        .query(&request("Summarize the Acme account", Some("s-err")), &CancellationToken::new())
        .await
        .unwrap();

    let error = response.error.expect("error info");
    assert_eq!(error.code, "MODEL_INVOCATION_FAILURE");
    assert!(response.answer.starts_with("An error occurred:"));
    assert!(response.answer.contains("connection reset"));

    let turns = h.conversations.history("s-err", 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::User);
}

#[tokio::test]
async fn test_cancelled_agent_run_reports_code() {
    let h = harness(ScriptedChat::new(vec![]), FakeGateway::default());
    let token = CancellationToken::new();
    token.cancel();

    let response = h
        .ctx
        .engine
        .query(&request("Send a message to the team", None), &token)
        .await
        .unwrap();

    assert_eq!(response.error.expect("error info").code, "CANCELLED");
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_rag_answer_reports_code() {
    let h = harness(ScriptedChat::new(vec![]), FakeGateway::default());
    let token = CancellationToken::new();
    token.cancel();

    let response = h
        .ctx
        .engine
        .query(&request("Summarize the Acme account", Some("s-rag")), &token)
        .await
        .unwrap();

    assert!(!response.is_action_response);
    assert_eq!(response.error.expect("error info").code, "CANCELLED");
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_a_stalled_rag_model_call() {
    let chat = Arc::new(StalledChat::default());
    let (ctx, conversations) = context_with_chat(chat.clone());
    let token = CancellationToken::new();

    let running = {
        let engine = ctx.engine.clone();
        let token = token.clone();
        tokio::spawn(async move {
            engine
                .query(&request("Summarize the Acme account", Some("s-stall")), &token)
                .await
        })
    };
    chat.entered.notified().await;
    token.cancel();

    let response = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("query should stop once cancelled")
        .unwrap()
        .unwrap();
    assert_eq!(response.error.expect("error info").code, "CANCELLED");

    let turns = conversations.history("s-stall", 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, Role::User);
}

#[tokio::test]
async fn test_invalid_request_is_an_error() {
    let h = harness(ScriptedChat::new(vec![]), FakeGateway::default());
    let mut req = request("hello", None);
    req.user_id = String::new();

    let err = h
        .ctx
        .engine
        .query(&req, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "userId must not be empty");
}
