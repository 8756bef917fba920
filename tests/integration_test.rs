/// Integration tests for tessera: the agent manager driving real contexts,
/// persisted to a temporary directory, with a scripted completion client.
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use tessera_config::Config;
use tessera_contexts::register_builtin_contexts;
use tessera_core::{AgentDirectory, AgentManager, ContextRegistry, DEFAULT_CONTEXTS};
use tessera_model::{CompletionClient, CompletionResponse, ScriptedClient, ToolCall};

fn config(root: &TempDir) -> Config {
    let mut config = Config::default();
    config.manager.save_dir = root.path().join("agents").to_string_lossy().into_owned();
    config.tools.tools_dir = root.path().join("tools").to_string_lossy().into_owned();
    config.tools.allowed_interpreters = vec!["sh".into()];
    config
}

fn manager(config: &Config, client: Arc<dyn CompletionClient>) -> AgentManager {
    let mut registry = ContextRegistry::new();
    register_builtin_contexts(&mut registry, config);
    AgentManager::new(config, registry, AgentDirectory::new(), client)
}

fn idle_client() -> Arc<dyn CompletionClient> {
    Arc::new(ScriptedClient::new(vec![]))
}

#[tokio::test]
async fn new_agent_gets_default_contexts_and_tools_dir() {
    let root = TempDir::new().unwrap();
    let config = config(&root);
    let manager = manager(&config, idle_client());

    let handle = manager.get_or_create_agent("7").await.unwrap();
    let agent = handle.lock().await;
    assert_eq!(agent.name(), "User_7");
    assert_eq!(agent.identity().user_id, "7");
    let kinds: Vec<&str> = agent.contexts().map(|c| c.kind()).collect();
    assert_eq!(kinds, DEFAULT_CONTEXTS);
    assert!(root.path().join("tools").join(agent.id()).is_dir());
    assert!(agent.tool("add_memory").is_some());
    assert!(agent.tool("create_tool").is_some());
}

#[tokio::test]
async fn same_user_gets_the_cached_agent() {
    let root = TempDir::new().unwrap();
    let manager = manager(&config(&root), idle_client());
    let first = manager.get_or_create_agent("a").await.unwrap();
    let second = manager.get_or_create_agent("a").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(manager.user_ids().await, vec!["a"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_lookups_share_one_agent() {
    let root = TempDir::new().unwrap();
    let manager = Arc::new(manager(&config(&root), idle_client()));

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_or_create_agent("race").await.unwrap() })
        })
        .collect();
    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(manager.directory().len(), 1);
    assert_eq!(manager.user_ids().await, vec!["race"]);
}

#[tokio::test]
async fn memories_written_in_a_turn_survive_reload() {
    let root = TempDir::new().unwrap();
    let config = config(&root);
    let client = Arc::new(ScriptedClient::replies(vec![
        CompletionResponse::tool_calls(vec![
            ToolCall::new("c1", "add_memory", r#"{"content": "likes tea", "importance": 4}"#),
            ToolCall::new("c2", "add_memory", r#"{"content": "lives in Lund", "importance": 9}"#),
        ]),
        CompletionResponse::text("Noted."),
    ]));

    let first = manager(&config, client);
    let handle = first.get_or_create_agent("u1").await.unwrap();
    let agent_id = {
        let mut agent = handle.lock().await;
        let produced = agent.run_loop("remember two things").await;
        assert_eq!(produced.last().and_then(|m| m.as_text()), Some("Noted."));
        agent.id().to_string()
    };
    first.save_agent("u1").await.unwrap();
    assert!(first.agent_path("u1").is_file());

    let second = manager(&config, idle_client());
    let handle = second.get_or_create_agent("u1").await.unwrap();
    let agent = handle.lock().await;
    assert_eq!(agent.id(), agent_id);
    assert_eq!(agent.message_log().len(), 5);

    let memory = agent.context_of_kind("memory").unwrap();
    let snapshot = memory.get_context(agent.identity()).unwrap();
    let lines: Vec<&str> = snapshot["memories"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Current memories:");
    assert!(lines[1].starts_with("- lives in Lund (ID: "));
    assert!(lines[2].starts_with("- likes tea (ID: "));
}

#[tokio::test]
async fn active_persona_and_switch_tool_survive_reload() {
    let root = TempDir::new().unwrap();
    let config = config(&root);

    let first = manager(&config, idle_client());
    let handle = first.get_or_create_agent("p").await.unwrap();
    let switch = {
        let mut agent = handle.lock().await;
        let created = agent
            .execute_tool(
                "create_persona",
                json!({"persona": "Speak like a sailor.", "description": "nautical", "name": "Old Salt"}),
            )
            .await;
        assert!(created.error.is_none(), "{created:?}");
        let switch = agent
            .tool_names()
            .into_iter()
            .find(|n| n.starts_with("become_old_salt_"))
            .unwrap();
        let switched = agent.execute_tool(&switch, json!({})).await;
        assert_eq!(switched.summary, "Now acting as Old Salt");
        switch
    };
    first.shutdown().await;

    let second = manager(&config, idle_client());
    let handle = second.get_or_create_agent("p").await.unwrap();
    let agent = handle.lock().await;
    assert!(agent.tool(&switch).is_some());
    assert!(agent
        .system_prompt()
        .contains("You are currently acting as Old Salt:\nSpeak like a sailor."));
}

#[tokio::test]
async fn created_tool_is_reloaded_with_the_agent() {
    let root = TempDir::new().unwrap();
    let config = config(&root);

    let first = manager(&config, idle_client());
    let handle = first.get_or_create_agent("t").await.unwrap();
    {
        let mut agent = handle.lock().await;
        let created = agent
            .execute_tool(
                "create_tool",
                json!({
                    "name": "greet",
                    "code": "echo hello",
                    "interpreter": "sh",
                    "description": "Say hello.",
                }),
            )
            .await;
        assert_eq!(created.summary, "Tool 'greet' created and loaded successfully");
    }
    first.save_all_agents().await;

    let second = manager(&config, idle_client());
    let handle = second.get_or_create_agent("t").await.unwrap();
    let mut agent = handle.lock().await;
    let out = agent.execute_tool("greet", json!({})).await;
    assert_eq!(out.summary, "hello");
}

#[tokio::test]
async fn unreadable_state_falls_back_to_a_new_agent() {
    let root = TempDir::new().unwrap();
    let config = config(&root);
    let manager = manager(&config, idle_client());
    let path = manager.agent_path("broken");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let handle = manager.get_or_create_agent("broken").await.unwrap();
    let agent = handle.lock().await;
    assert_eq!(agent.contexts().count(), DEFAULT_CONTEXTS.len());
    assert!(agent.message_log().is_empty());
}

#[tokio::test]
async fn remove_agent_forgets_and_deletes() {
    let root = TempDir::new().unwrap();
    let manager = manager(&config(&root), idle_client());
    let handle = manager.get_or_create_agent("gone").await.unwrap();
    let agent_id = handle.lock().await.id().to_string();
    manager.save_agent("gone").await.unwrap();

    manager.remove_agent("gone").await.unwrap();
    assert!(!manager.agent_path("gone").exists());
    assert!(!manager.directory().contains(&agent_id));
    assert!(manager.user_ids().await.is_empty());
}

#[tokio::test]
async fn shutdown_stops_autosave_and_saves() {
    let root = TempDir::new().unwrap();
    let manager = Arc::new(manager(&config(&root), idle_client()));
    manager.spawn_autosave(Duration::from_secs(3600));
    manager.get_or_create_agent("s").await.unwrap();

    manager.shutdown().await;
    assert!(manager.agent_path("s").is_file());
}
