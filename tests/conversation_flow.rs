//! 端到端对话流程：脚本化 Mock LLM + 临时目录存储

use std::sync::Arc;

use async_trait::async_trait;
use mentor::agents::{AgentClients, HandlerRegistry};
use mentor::config::AppConfig;
use mentor::intent::UserIntent;
use mentor::llm::{MockLlmClient, MockReply};
use mentor::memory::{ConversationStore, Role};
use mentor::tools::{RetrievalClient, SearchHit};
use mentor::Workflow;
use serde_json::json;
use tempfile::TempDir;

struct NoRetrieval;

#[async_trait]
impl RetrievalClient for NoRetrieval {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, String> {
        Ok(Vec::new())
    }

    async fn fetch_content(&self, _url: &str) -> Option<String> {
        None
    }
}

fn registry(llm: Arc<MockLlmClient>) -> Arc<HandlerRegistry> {
    Arc::new(HandlerRegistry::with_clients(
        AgentClients::shared(llm),
        Arc::new(NoRetrieval),
        &AppConfig::default(),
    ))
}

fn open(llm: Arc<MockLlmClient>, dir: &TempDir, id: &str) -> Workflow {
    Workflow::new(
        registry(llm),
        ConversationStore::new(dir.path()),
        "Hi there! What's up?",
        Some(id.to_string()),
    )
}

#[tokio::test]
async fn test_two_turn_conversation_is_persisted_and_sticky() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::new(dir.path());
    let llm = Arc::new(MockLlmClient::scripted(vec![
        // turn 1: classifier, orchestrator -> explainer tool, explainer, orchestrator closing
        MockReply::text("explain"),
        MockReply::tool_call("explainer", json!({"message": "Can you explain recursion?"})),
        MockReply::text("Recursion is when a function solves a problem by calling itself on a smaller input."),
        MockReply::text("I hope this explanation of recursion helps!"),
        // turn 2: orchestrator answers directly
        MockReply::text("You're welcome, good luck with your exam!"),
    ]));
    let mut wf = open(llm.clone(), &dir, "s1");

    let first = wf.process_query("Can you explain recursion?").await;
    assert!(first.success);
    assert!(!first.response.trim().is_empty());
    assert!(first.saved);
    assert_eq!(first.state.user_intent, UserIntent::Explain);
    assert_eq!(first.state.turn_count, 1);

    let record = store.load("s1").unwrap();
    assert_eq!(record.messages.len(), 2);
    assert_eq!(record.messages[0].role, Role::User);
    assert_eq!(record.messages[0].content, "Can you explain recursion?");
    assert_eq!(record.messages[1].role, Role::Assistant);
    assert_eq!(record.metadata.get("user_intent"), Some(&json!("explain")));

    let second = wf.process_query("thanks").await;
    assert!(second.success);
    assert_eq!(second.response, "You're welcome, good luck with your exam!");
    assert_eq!(second.state.user_intent, UserIntent::Explain);

    let record = store.load("s1").unwrap();
    assert_eq!(record.messages.len(), 4);
    assert_eq!(record.metadata.get("user_intent"), Some(&json!("explain")));
    assert_eq!(record.metadata.get("turn_count"), Some(&json!(2)));

    // 第二轮意图已知，不再调用分类器：5 条预设全部消费，第 5 次调用带工具定义
    assert_eq!(llm.remaining(), 0);
    assert_eq!(llm.calls().len(), 5);
    assert!(!llm.calls()[4].tools.is_empty());
}

#[tokio::test]
async fn test_tool_traffic_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::scripted(vec![
        MockReply::text("explain"),
        MockReply::tool_call("explainer", json!({"message": "What is a heap?"})),
        MockReply::text("A heap is a tree where every parent is ordered before its children."),
        MockReply::text("Let me know if you want an example."),
    ]));
    let mut wf = open(llm, &dir, "s-filter");

    let outcome = wf.process_query("What is a heap?").await;
    let in_memory: Vec<Role> = outcome.state.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        in_memory,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(
        outcome.response,
        "A heap is a tree where every parent is ordered before its children."
    );

    let record = ConversationStore::new(dir.path()).load("s-filter").unwrap();
    let persisted: Vec<(Role, &str)> = record
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        persisted,
        vec![
            (Role::User, "What is a heap?"),
            (
                Role::Assistant,
                "A heap is a tree where every parent is ordered before its children."
            ),
        ]
    );
}

#[tokio::test]
async fn test_hydration_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::scripted(vec![
        MockReply::text("learn"),
        MockReply::text("Here is a revision sheet on graphs."),
    ]));
    let mut wf = open(llm, &dir, "s-hydrate");
    wf.process_query("Summarise graph traversal for revision").await;

    let fresh = Arc::new(MockLlmClient::new());
    let first = open(fresh.clone(), &dir, "s-hydrate");
    let second = open(fresh.clone(), &dir, "s-hydrate");

    let a = first.state().unwrap();
    let b = second.state().unwrap();
    assert_eq!(a.messages, b.messages);
    assert_eq!(a.messages.len(), 2);
    assert_eq!(a.user_intent, UserIntent::Learn);
    assert_eq!(a.turn_count, 1);
    assert!(fresh.calls().is_empty());
}

#[tokio::test]
async fn test_delete_conversation() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::scripted(vec![
        MockReply::text("explain"),
        MockReply::text("Big-O describes how cost grows with input size."),
    ]));

    let empty = open(llm.clone(), &dir, "never-saved");
    assert!(!empty.delete_conversation());

    let mut wf = open(llm, &dir, "s-delete");
    wf.process_query("Explain big-O").await;
    assert!(wf.delete_conversation());
    assert!(ConversationStore::new(dir.path()).load("s-delete").is_none());
    assert!(!wf.delete_conversation());
}

#[tokio::test]
async fn test_failed_turn_leaves_previous_turn_intact() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::scripted(vec![
        MockReply::text("explain"),
        MockReply::text("A linked list is a chain of nodes."),
        MockReply::error("connection reset by peer"),
    ]));
    let mut wf = open(llm, &dir, "s-recover");

    assert!(wf.process_query("Explain linked lists").await.success);
    let failed = wf.process_query("and arrays?").await;

    assert!(!failed.success);
    assert_eq!(failed.response, "Hi there! What's up?");
    assert!(!failed.response.contains("connection reset"));
    assert_eq!(failed.state.messages.len(), 2);
    assert_eq!(failed.state.user_intent, UserIntent::Explain);
    assert_eq!(failed.state.turn_count, 1);

    let record = ConversationStore::new(dir.path()).load("s-recover").unwrap();
    assert_eq!(record.messages.len(), 2);
}

#[tokio::test]
async fn test_learner_without_sources_still_answers() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::scripted(vec![
        MockReply::text("learn"),
        MockReply::tool_call("learner", json!({"message": "notes on tries"})),
        MockReply::tool_call("web_search", json!({"query": "trie data structure"})),
        MockReply::text("## Tries\n- prefix tree (from my own knowledge, no sources found)"),
        MockReply::text("Here are your notes."),
    ]));
    let mut wf = open(llm.clone(), &dir, "s-learn");

    let outcome = wf.process_query("Give me notes on tries").await;
    assert!(outcome.success);
    assert!(outcome.response.starts_with("## Tries"));

    let search_result = llm.calls()[3]
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Tool)
        .map(|m| m.text())
        .unwrap();
    assert_eq!(search_result, "No relevant sources found.");
}

#[tokio::test]
async fn test_handler_failure_inside_tool_call_is_not_shown_to_user() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::scripted(vec![
        MockReply::text("explain"),
        MockReply::tool_call("explainer", json!({"message": "Explain recursion"})),
        MockReply::error("401 invalid api key sk-abc123"),
        MockReply::text("Sorry, I had trouble there. Recursion is a function that calls itself on a smaller input."),
    ]));
    let mut wf = open(llm, &dir, "s-tool-error");

    let outcome = wf.process_query("Explain recursion").await;
    assert!(outcome.success);
    assert!(!outcome.response.contains("Error"));
    assert!(!outcome.response.contains("sk-abc123"));
    assert!(outcome.response.starts_with("Sorry, I had trouble there."));
    assert!(outcome.state.errors.iter().any(|e| e.contains("sk-abc123")));

    let record = ConversationStore::new(dir.path()).load("s-tool-error").unwrap();
    assert_eq!(record.messages.len(), 2);
    assert!(record.messages.iter().all(|m| !m.content.contains("sk-abc123")));
}

#[tokio::test]
async fn test_delivered_reply_is_what_the_next_turn_sees() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::scripted(vec![
        MockReply::text("explain"),
        MockReply::tool_call("explainer", json!({"message": "What is a trie?"})),
        MockReply::text("A trie is a prefix tree keyed by characters."),
        MockReply::text("Hope that helps!"),
    ]));
    let mut wf = open(llm, &dir, "s-reply");
    wf.process_query("What is a trie?").await;

    let resumed = Arc::new(MockLlmClient::scripted(vec![MockReply::text("Glad to help.")]));
    let mut again = open(resumed.clone(), &dir, "s-reply");
    again.process_query("thanks").await;

    let seen: Vec<String> = resumed.calls()[0].messages.iter().map(|m| m.text()).collect();
    assert_eq!(
        seen,
        vec![
            "What is a trie?".to_string(),
            "A trie is a prefix tree keyed by characters.".to_string(),
            "thanks".to_string(),
        ]
    );
}
