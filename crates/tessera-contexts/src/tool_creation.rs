// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent-authored tools.
//!
//! A created tool is a JSON manifest under `<tools_dir>/<agent_id>/`.  It
//! names an interpreter from the configured allow-list and carries the
//! script source.  Calling the tool runs the interpreter in a subprocess
//! with:
//!
//! - the script passed inline (`-c`, or `-e` for interpreters that use it)
//! - the call arguments as one JSON document on stdin
//! - an environment holding nothing but `PATH`
//! - a timeout, after which the child is killed
//!
//! Stdout becomes the tool result, parsed as JSON when it is JSON.  The
//! allow-list restricts which interpreters run, not what a script may do;
//! isolating the scripts themselves is left to the deployment.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use tessera_config::ToolsConfig;
use tessera_core::{Context, ContextData};
use tessera_tools::{
    AgentIdentity, FnTool, Param, ParamType, SchemaError, Tool, ToolCtx, ToolResponse,
    ToolSignature, ToolValue, IDENTITY_PARAM,
};

use crate::{dedent, finish_tools, lock, new_context_id, restore_id, tool_names};

const MANIFEST_EXT: &str = "json";

const INSTRUCTIONS: &str = "
    Tool Creation Context Instructions:
    - Use create_tool to define new tools; the script receives its arguments
      as a JSON object on stdin and prints its result to stdout
    - Use update_tool to replace the code of a tool you created
    - Use remove_tool to delete existing tools
    - Use list_tools to see available tools
";

#[derive(Debug, Clone)]
pub struct ToolCreationSettings {
    pub tools_dir: PathBuf,
    pub allowed_interpreters: Vec<String>,
    pub timeout: Duration,
    pub summary_limit: usize,
}

impl ToolCreationSettings {
    pub fn from_config(cfg: &ToolsConfig, summary_limit: usize) -> Self {
        Self {
            tools_dir: cfg.resolved_tools_dir(),
            allowed_interpreters: cfg.allowed_interpreters.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            summary_limit,
        }
    }

    pub fn agent_dir(&self, agent_id: &str) -> PathBuf {
        self.tools_dir.join(agent_id)
    }

    fn manifest_path(&self, agent_id: &str, name: &str) -> PathBuf {
        self.agent_dir(agent_id).join(format!("{name}.{MANIFEST_EXT}"))
    }
}

// ── Manifest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub interpreter: String,
    /// Parameter name → type name; every parameter is required.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub code: String,
}

fn valid_tool_name(name: &str) -> bool {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

impl ToolManifest {
    pub fn validate(&self, allowed_interpreters: &[String]) -> anyhow::Result<()> {
        if !valid_tool_name(&self.name) {
            bail!(
                "tool name '{}' must start with a lowercase letter and contain only \
                 lowercase letters, digits and underscores (at most 64 characters)",
                self.name
            );
        }
        if !allowed_interpreters.iter().any(|i| *i == self.interpreter) {
            bail!(
                "interpreter '{}' is not allowed; choose one of: {}",
                self.interpreter,
                allowed_interpreters.join(", ")
            );
        }
        if self.code.trim().is_empty() {
            bail!("tool code is empty");
        }
        self.signature().map(|_| ())
    }

    pub fn signature(&self) -> anyhow::Result<ToolSignature> {
        let doc = if self.description.trim().is_empty() {
            format!("Agent-created {} tool.", self.interpreter)
        } else {
            self.description.clone()
        };
        let mut sig = ToolSignature::new(&self.name, doc);
        for (param, ty) in &self.parameters {
            if param == IDENTITY_PARAM {
                bail!("parameter name '{IDENTITY_PARAM}' is reserved");
            }
            let ty: ParamType = ty.parse()?;
            sig = sig.param(Param::required(param, ty));
        }
        Ok(sig)
    }
}

/// Flag that makes `interpreter` run source given on the command line.
fn inline_flag(interpreter: &str) -> &'static str {
    match interpreter {
        "node" | "perl" | "ruby" => "-e",
        _ => "-c",
    }
}

// ── Running scripts ───────────────────────────────────────────────────────────

async fn find_interpreter(name: &str) -> anyhow::Result<PathBuf> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return Ok(candidate);
        }
    }
    bail!("interpreter '{name}' not found on PATH")
}

async fn run_script(
    manifest: &ToolManifest,
    workdir: &Path,
    args: Value,
    timeout: Duration,
) -> anyhow::Result<ToolValue> {
    let mut cmd = Command::new(&manifest.interpreter);
    cmd.arg(inline_flag(&manifest.interpreter))
        .arg(&manifest.code)
        .env_clear()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(path) = std::env::var_os("PATH") {
        cmd.env("PATH", path);
    }
    if workdir.is_dir() {
        cmd.current_dir(workdir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning interpreter '{}'", manifest.interpreter))?;
    let payload = serde_json::to_vec(&args)?;

    let run = async move {
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(error = %e, "script did not read its arguments");
            }
        }
        child.wait_with_output().await
    };
    let output = match tokio::time::timeout(timeout, run).await {
        Ok(result) => result.context("waiting for tool script")?,
        Err(_) => bail!("timed out after {}s", timeout.as_secs()),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("script {}: {}", output.status, stderr.trim());
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(match serde_json::from_str::<Value>(&stdout) {
        Ok(value) => ToolValue::Json(value),
        Err(_) => ToolValue::Text(stdout),
    })
}

/// Wrap a manifest as a callable tool.  The interpreter lookup runs lazily
/// before the first call.
fn build_tool(
    settings: &ToolCreationSettings,
    agent_id: &str,
    manifest: &ToolManifest,
) -> anyhow::Result<Arc<dyn Tool>> {
    let sig = manifest.signature()?;
    let manifest = Arc::new(manifest.clone());
    let workdir = settings.agent_dir(agent_id);
    let timeout = settings.timeout;
    let interpreter = manifest.interpreter.clone();

    let tool = FnTool::new(sig, move |_ctx, args| {
        let manifest = manifest.clone();
        let workdir = workdir.clone();
        async move { run_script(&manifest, &workdir, args.to_value(), timeout).await }
    })?
    .with_prepare(move || {
        let interpreter = interpreter.clone();
        async move { find_interpreter(&interpreter).await.map(|_| ()) }
    })
    .with_summary_limit(settings.summary_limit);
    Ok(tool.into_arc())
}

// ── Manifest storage ──────────────────────────────────────────────────────────

async fn write_manifest(settings: &ToolCreationSettings, agent_id: &str, manifest: &ToolManifest) -> anyhow::Result<()> {
    let dir = settings.agent_dir(agent_id);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    let path = settings.manifest_path(agent_id, &manifest.name);
    let text = serde_json::to_string_pretty(manifest)?;
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

async fn read_manifest(path: &Path) -> anyhow::Result<ToolManifest> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn manifest_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXT) {
        return None;
    }
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

async fn list_manifests(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(anyhow!(e).context(format!("listing {}", dir.display()))),
    };
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = manifest_name(&entry.path()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

// ── Tools ─────────────────────────────────────────────────────────────────────

/// agent id → names of the tools it created
type Created = Arc<Mutex<HashMap<String, BTreeSet<String>>>>;

fn error_response(msg: impl Into<String>) -> ToolValue {
    let msg = msg.into();
    ToolResponse {
        summary: msg.clone(),
        content: Some(json!({"status": "error", "message": msg})),
        error: Some(msg),
    }
    .into()
}

fn success_response(msg: String, extra: Value) -> ToolValue {
    let mut content = json!({"status": "success", "message": msg});
    if let (Some(obj), Value::Object(more)) = (content.as_object_mut(), extra) {
        obj.extend(more);
    }
    ToolResponse::ok(msg, content).into()
}

fn parse_parameters(raw: Option<&Value>) -> anyhow::Result<BTreeMap<String, String>> {
    match raw {
        None => Ok(BTreeMap::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(BTreeMap::new()),
        Some(Value::String(s)) => serde_json::from_str(s).context("parameters must map names to type names"),
        Some(other) => {
            serde_json::from_value(other.clone()).context("parameters must map names to type names")
        }
    }
}

fn create_tool(settings: &Arc<ToolCreationSettings>, created: &Created) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "create_tool",
        "Create a new tool from a script.\n\n\
         name: tool name (lowercase letters, digits and underscores)\n\
         code: script source; it reads its arguments as JSON from stdin and prints the result\n\
         description: what the tool does\n\
         interpreter: interpreter that runs the script\n\
         parameters: JSON object mapping parameter names to types (str, int, float, bool, list, dict)",
    )
    .required("name", ParamType::String)
    .required("code", ParamType::String)
    .optional("description", ParamType::String, json!(""))
    .optional("interpreter", ParamType::String, json!("python3"))
    .optional("parameters", ParamType::String, json!("{}"));
    let settings = settings.clone();
    let created = created.clone();
    FnTool::new(sig, move |ctx, args| {
        let settings = settings.clone();
        let created = created.clone();
        async move {
            let name = args.str("name")?.to_string();
            info!(agent_id = %ctx.agent_id(), tool_name = %name, "creating tool");

            let parameters = match parse_parameters(args.get("parameters")) {
                Ok(p) => p,
                Err(e) => return Ok(error_response(format!("Invalid tool definition: {e:#}"))),
            };
            let manifest = ToolManifest {
                name: name.clone(),
                description: args.str("description")?.to_string(),
                interpreter: args.str("interpreter")?.to_string(),
                parameters,
                code: args.str("code")?.to_string(),
            };
            if let Err(e) = manifest.validate(&settings.allowed_interpreters) {
                warn!(tool_name = %name, error = %e, "rejected tool definition");
                return Ok(error_response(format!("Invalid tool definition: {e:#}")));
            }
            let tool = match build_tool(&settings, ctx.agent_id(), &manifest) {
                Ok(tool) => tool,
                Err(e) => return Ok(error_response(format!("Failed to load tool: {e:#}"))),
            };
            if let Err(e) = write_manifest(&settings, ctx.agent_id(), &manifest).await {
                return Ok(error_response(format!("Failed to create tool file: {e:#}")));
            }

            ctx.effects.register(tool);
            lock(&created).entry(ctx.agent_id().to_string()).or_default().insert(name.clone());
            anyhow::Ok(success_response(
                format!("Tool '{name}' created and loaded successfully"),
                json!({"tool": manifest}),
            ))
        }
    })
}

fn list_tools(settings: &Arc<ToolCreationSettings>, created: &Created) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new("list_tools", "List all available custom tools.");
    let settings = settings.clone();
    let created = created.clone();
    FnTool::new(sig, move |ctx, _args| {
        let settings = settings.clone();
        let created = created.clone();
        async move {
            let names = list_manifests(&settings.agent_dir(ctx.agent_id())).await?;
            lock(&created).insert(ctx.agent_id().to_string(), names.iter().cloned().collect());
            if names.is_empty() {
                return anyhow::Ok(
                    ToolResponse::ok("No custom tools available", json!({"tools": []})).into(),
                );
            }
            Ok(ToolResponse::ok(
                format!("Available tools: {}", names.join(", ")),
                json!({"tools": names}),
            )
            .into())
        }
    })
}

/// Path of an existing manifest, or `None` for unknown or malformed names.
async fn existing_manifest(settings: &ToolCreationSettings, agent_id: &str, name: &str) -> Option<PathBuf> {
    if !valid_tool_name(name) {
        return None;
    }
    let path = settings.manifest_path(agent_id, name);
    tokio::fs::try_exists(&path).await.ok()?.then_some(path)
}

fn remove_tool(settings: &Arc<ToolCreationSettings>, created: &Created) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new("remove_tool", "Remove a custom tool.\n\nname: name of the tool to remove")
        .required("name", ParamType::String);
    let settings = settings.clone();
    let created = created.clone();
    FnTool::new(sig, move |ctx, args| {
        let settings = settings.clone();
        let created = created.clone();
        async move {
            let name = args.str("name")?.to_string();
            let Some(path) = existing_manifest(&settings, ctx.agent_id(), &name).await else {
                return anyhow::Ok(error_response(format!("Tool '{name}' not found")));
            };
            if let Err(e) = tokio::fs::remove_file(&path).await {
                return Ok(error_response(format!("Error removing tool '{name}': {e}")));
            }
            ctx.effects.unregister(name.clone());
            if let Some(names) = lock(&created).get_mut(ctx.agent_id()) {
                names.remove(&name);
            }
            info!(agent_id = %ctx.agent_id(), tool_name = %name, "removed tool");
            Ok(success_response(format!("Tool '{name}' removed successfully"), json!({})))
        }
    })
}

fn update_tool(settings: &Arc<ToolCreationSettings>, created: &Created) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "update_tool",
        "Update an existing tool with new code.\n\n\
         name: name of the tool to update\n\
         code: new script source",
    )
    .required("name", ParamType::String)
    .required("code", ParamType::String);
    let settings = settings.clone();
    let created = created.clone();
    FnTool::new(sig, move |ctx, args| {
        let settings = settings.clone();
        let created = created.clone();
        async move {
            let name = args.str("name")?.to_string();
            let Some(path) = existing_manifest(&settings, ctx.agent_id(), &name).await else {
                return anyhow::Ok(error_response(format!("Tool '{name}' not found")));
            };
            let mut manifest = match read_manifest(&path).await {
                Ok(m) => m,
                Err(e) => return Ok(error_response(format!("Failed to update tool: {e:#}"))),
            };
            manifest.code = args.str("code")?.to_string();
            if let Err(e) = manifest.validate(&settings.allowed_interpreters) {
                return Ok(error_response(format!("Invalid tool definition: {e:#}")));
            }
            let tool = match build_tool(&settings, ctx.agent_id(), &manifest) {
                Ok(tool) => tool,
                Err(e) => return Ok(error_response(format!("Failed to reload tool: {e:#}"))),
            };
            if let Err(e) = write_manifest(&settings, ctx.agent_id(), &manifest).await {
                return Ok(error_response(format!("Failed to update tool: {e:#}")));
            }

            ctx.effects.register(tool);
            lock(&created).entry(ctx.agent_id().to_string()).or_default().insert(name.clone());
            info!(agent_id = %ctx.agent_id(), tool_name = %name, "updated tool");
            Ok(success_response(format!("Tool '{name}' updated and reloaded successfully"), json!({})))
        }
    })
}

// ── Context ───────────────────────────────────────────────────────────────────

pub struct ToolCreationContext {
    id: String,
    settings: Arc<ToolCreationSettings>,
    created: Created,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolCreationContext {
    pub const KIND: &'static str = "tool_creation";

    pub fn new(settings: ToolCreationSettings) -> Result<Self, SchemaError> {
        let settings = Arc::new(settings);
        let created: Created = Arc::default();
        let tools = vec![
            create_tool(&settings, &created)?,
            list_tools(&settings, &created)?,
            remove_tool(&settings, &created)?,
            update_tool(&settings, &created)?,
        ];
        Ok(Self {
            id: new_context_id(),
            tools: finish_tools(tools, settings.summary_limit),
            settings,
            created,
        })
    }

    /// Rebuild every stored tool of one agent.  Manifests that fail to
    /// parse, validate or build are skipped.
    fn reload(&self, agent_id: &str) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
        let dir = self.settings.agent_dir(agent_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow!(e).context(format!("listing {}", dir.display()))),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| manifest_name(p).is_some())
            .collect();
        paths.sort();

        let mut tools = Vec::new();
        for path in paths {
            let loaded = std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|text| Ok(serde_json::from_str::<ToolManifest>(&text)?))
                .and_then(|m| {
                    m.validate(&self.settings.allowed_interpreters)?;
                    build_tool(&self.settings, agent_id, &m)
                });
            match loaded {
                Ok(tool) => tools.push(tool),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping stored tool"),
            }
        }
        Ok(tools)
    }
}

impl Context for ToolCreationContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    fn get_context(&self, identity: &AgentIdentity) -> Option<ContextData> {
        let created: Vec<String> = lock(&self.created)
            .get(&identity.id)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default();
        let mut data = Map::new();
        data.insert("created_tools".into(), json!(created));
        data.insert("tools".into(), tool_names(&self.tools));
        Some(data)
    }

    fn get_context_instructions(&self, _identity: &AgentIdentity) -> Option<String> {
        Some(format!(
            "{}\n\nAllowed interpreters: {}",
            dedent(INSTRUCTIONS),
            self.settings.allowed_interpreters.join(", ")
        ))
    }

    fn serialize(&self) -> Value {
        json!({"id": self.id})
    }

    fn deserialize(&mut self, state: &Value, ctx: &ToolCtx) -> anyhow::Result<()> {
        restore_id(&mut self.id, state);
        let tools = self.reload(ctx.agent_id())?;
        let names: BTreeSet<String> = tools.iter().map(|t| t.name().to_string()).collect();
        debug!(agent_id = %ctx.agent_id(), count = names.len(), "reloaded stored tools");
        lock(&self.created).insert(ctx.agent_id().to_string(), names);
        for tool in tools {
            ctx.effects.register(tool);
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tessera_core::Agent;
    use tessera_model::MockClient;

    use super::*;

    fn settings(dir: &TempDir) -> ToolCreationSettings {
        ToolCreationSettings {
            tools_dir: dir.path().to_path_buf(),
            allowed_interpreters: vec!["sh".into()],
            timeout: Duration::from_secs(5),
            summary_limit: 100,
        }
    }

    fn agent(dir: &TempDir) -> Agent {
        let mut agent = Agent::new("tester", "gpt-4", 1000, Arc::new(MockClient));
        agent.register_context(Box::new(ToolCreationContext::new(settings(dir)).unwrap()));
        agent
    }

    fn manifest(name: &str, interpreter: &str, code: &str) -> ToolManifest {
        ToolManifest {
            name: name.into(),
            description: String::new(),
            interpreter: interpreter.into(),
            parameters: BTreeMap::new(),
            code: code.into(),
        }
    }

    async fn create(agent: &mut Agent, name: &str, code: &str, parameters: &str) -> ToolResponse {
        agent
            .execute_tool(
                "create_tool",
                json!({"name": name, "code": code, "interpreter": "sh", "parameters": parameters}),
            )
            .await
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn manifest_validation() {
        let allowed = vec!["sh".to_string()];
        assert!(manifest("ok_tool", "sh", "echo hi").validate(&allowed).is_ok());
        assert!(manifest("Bad", "sh", "echo").validate(&allowed).is_err());
        assert!(manifest("../escape", "sh", "echo").validate(&allowed).is_err());
        assert!(manifest(&"a".repeat(65), "sh", "echo").validate(&allowed).is_err());
        let err = manifest("t", "python3", "print(1)").validate(&allowed).unwrap_err();
        assert!(err.to_string().contains("interpreter 'python3' is not allowed"));
        assert!(manifest("t", "sh", "   ").validate(&allowed).is_err());

        let mut typed = manifest("t", "sh", "cat");
        typed.parameters.insert("x".into(), "complex".into());
        assert!(typed.validate(&allowed).is_err());
        typed.parameters.insert("x".into(), "int".into());
        assert!(typed.validate(&allowed).is_ok());
    }

    #[test]
    fn signature_lists_parameters_as_required() {
        let mut m = manifest("adder", "sh", "cat");
        m.parameters.insert("a".into(), "int".into());
        m.parameters.insert("b".into(), "float".into());
        let schema = tessera_tools::function_to_schema(&m.signature().unwrap()).unwrap();
        let params = &schema["function"]["parameters"];
        assert_eq!(params["properties"]["a"]["type"], "integer");
        assert_eq!(params["properties"]["b"]["type"], "number");
        assert_eq!(params["required"], json!(["a", "b"]));
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn created_tool_runs_with_stdin_arguments() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent(&dir);
        let resp = create(&mut agent, "echo_args", "cat", r#"{"text": "str"}"#).await;
        assert_eq!(resp.summary, "Tool 'echo_args' created and loaded successfully");
        assert!(dir.path().join(agent.id()).join("echo_args.json").is_file());

        let out = agent.execute_tool("echo_args", json!({"text": "hi"})).await;
        assert!(out.error.is_none(), "{out:?}");
        assert_eq!(out.content, Some(json!({"text": "hi"})));

        let missing = agent.execute_tool("echo_args", json!({})).await;
        assert!(missing.error.unwrap().contains("missing required argument 'text'"));
    }

    #[tokio::test]
    async fn script_sees_only_path() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent(&dir);
        create(&mut agent, "env_probe", r#"echo "${HOME:-unset}""#, "{}").await;
        let out = agent.execute_tool("env_probe", json!({})).await;
        assert_eq!(out.summary, "unset");
    }

    #[tokio::test]
    async fn failing_script_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent(&dir);
        create(&mut agent, "broken", "echo oops >&2; exit 3", "{}").await;
        let out = agent.execute_tool("broken", json!({})).await;
        assert!(out.error.unwrap().contains("oops"));
    }

    #[tokio::test]
    async fn slow_script_times_out() {
        let dir = TempDir::new().unwrap();
        let mut s = settings(&dir);
        s.timeout = Duration::from_secs(1);
        let mut agent = Agent::new("tester", "gpt-4", 1000, Arc::new(MockClient));
        agent.register_context(Box::new(ToolCreationContext::new(s).unwrap()));
        create(&mut agent, "sleepy", "sleep 5", "{}").await;
        let out = agent.execute_tool("sleepy", json!({})).await;
        assert!(out.error.unwrap().contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn disallowed_interpreter_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent(&dir);
        let resp = agent
            .execute_tool("create_tool", json!({"name": "py", "code": "print(1)"}))
            .await;
        assert!(resp.summary.starts_with("Invalid tool definition: interpreter 'python3'"));
        assert!(agent.tool("py").is_none());
    }

    #[tokio::test]
    async fn list_update_remove_messages() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent(&dir);
        let empty = agent.execute_tool("list_tools", json!({})).await;
        assert_eq!(empty.summary, "No custom tools available");

        create(&mut agent, "beta", "echo b", "{}").await;
        create(&mut agent, "alpha", "echo a", "{}").await;
        let listed = agent.execute_tool("list_tools", json!({})).await;
        assert_eq!(listed.summary, "Available tools: alpha, beta");

        let updated = agent.execute_tool("update_tool", json!({"name": "alpha", "code": "echo A"})).await;
        assert_eq!(updated.summary, "Tool 'alpha' updated and reloaded successfully");
        assert_eq!(agent.execute_tool("alpha", json!({})).await.summary, "A");

        let removed = agent.execute_tool("remove_tool", json!({"name": "alpha"})).await;
        assert_eq!(removed.summary, "Tool 'alpha' removed successfully");
        assert!(agent.tool("alpha").is_none());

        let gone = agent.execute_tool("remove_tool", json!({"name": "alpha"})).await;
        assert_eq!(gone.summary, "Tool 'alpha' not found");
        let gone = agent.execute_tool("update_tool", json!({"name": "nope", "code": "x"})).await;
        assert_eq!(gone.summary, "Tool 'nope' not found");
    }

    #[tokio::test]
    async fn deserialize_reloads_stored_tools_and_skips_broken_ones() {
        let dir = TempDir::new().unwrap();
        let mut agent = agent(&dir);
        create(&mut agent, "keeper", "echo kept", "{}").await;
        std::fs::write(dir.path().join(agent.id()).join("broken.json"), "{not json").unwrap();
        let state = agent.contexts().next().unwrap().serialize();

        let mut fresh = ToolCreationContext::new(settings(&dir)).unwrap();
        let ctx = ToolCtx::new(agent.identity().clone());
        fresh.deserialize(&state, &ctx).unwrap();
        let names: Vec<String> = ctx
            .effects
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                tessera_tools::ToolEffect::Register(tool) => Some(tool.name().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["keeper"]);
        assert_eq!(fresh.get_context(agent.identity()).unwrap()["created_tools"], json!(["keeper"]));
    }
}
