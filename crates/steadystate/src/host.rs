//! The CLI as a host: settings, tracked state and the sandbox API

use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use steadystate_connect::{SandboxConnect, SandboxSettings};
use steadystate_core::{
    Diagnostics, EngineConfig, HostState, InvocationContext, ResourceData, Severity,
    StateManager, config,
};

const SANDBOX_FILE: &str = "sandbox.json";

/// `.steadystate/config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,

    pub sandbox: SandboxSettings,
}

pub struct Host {
    pub config: HostConfig,
    pub state: StateManager,
    pub api: SandboxConnect,
}

impl Host {
    pub async fn open(project_root: &Path) -> anyhow::Result<Self> {
        tracing::debug!("Opening project at {}", project_root.display());
        let config: HostConfig = config::load_or_default(project_root)?;
        config.engine.validate()?;

        let state = StateManager::new(project_root);
        let api = SandboxConnect::load(&state.state_dir().join(SANDBOX_FILE)).await?;
        api.set_settings(config.sandbox);

        Ok(Self { config, state, api })
    }

    fn sandbox_path(&self) -> PathBuf {
        self.state.state_dir().join(SANDBOX_FILE)
    }

    pub async fn save_sandbox(&self) -> anyhow::Result<()> {
        self.api.save(&self.sandbox_path()).await?;
        Ok(())
    }

    /// Context for one invocation; Ctrl-C cancels it
    pub fn context(&self) -> InvocationContext {
        let ctx = InvocationContext::new();
        let cancel = ctx.cancellation().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Interrupted, cancelling...".yellow());
                cancel.cancel();
            }
        });
        ctx
    }

    /// Record `data` under `name` and persist state and sandbox together
    pub async fn commit(
        &self,
        state: &mut HostState,
        name: &str,
        data: &ResourceData,
    ) -> anyhow::Result<()> {
        state.record(name, data);
        self.state.save(state).await?;
        self.save_sandbox().await
    }
}

/// Parse `--attrs`
pub fn parse_attrs(attrs: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(attrs) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => anyhow::bail!("--attrs must be a JSON object"),
        Err(e) => anyhow::bail!("--attrs is not valid JSON: {}", e),
    }
}

pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for d in diagnostics.iter() {
        let label = match d.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        eprintln!("{}: {}", label, d.summary);
        eprintln!("  {}", d.detail);
        if d.retryable {
            eprintln!("  {}", "retrying later may succeed".dimmed());
        }
    }
}

/// Print diagnostics and turn them into the command's error
pub fn failed(operation: &str, name: &str, diagnostics: &Diagnostics) -> anyhow::Error {
    print_diagnostics(diagnostics);
    anyhow::anyhow!("{} of '{}' failed", operation, name)
}

/// Show the uncommitted snapshot a timed-out wait left in `data`
pub fn print_last_observed(diagnostics: &Diagnostics, data: &ResourceData) {
    if diagnostics.iter().any(|d| d.severity == Severity::Warning) {
        println!("{}", "Last observed:".yellow());
        print_attributes(data);
    }
}

pub fn print_attributes(data: &ResourceData) {
    for (field, value) in data.attributes() {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("  {} = {}", field.bold(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_flattens_engine_settings() {
        let yaml = r#"
timeouts:
  create: 30
poll_interval_ms: 10
sandbox:
  page_size: 2
  visibility_lag: 3
"#;
        let config: HostConfig = load_yaml(yaml);
        assert_eq!(config.engine.timeouts.create, Duration::from_secs(30));
        assert_eq!(config.engine.timeouts.read, Duration::from_secs(60));
        assert_eq!(config.engine.poll_interval_ms, Some(10));
        assert_eq!(config.sandbox.page_size, 2);
        assert_eq!(config.sandbox.visibility_lag, 3);
    }

    fn load_yaml(yaml: &str) -> HostConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        config::load_file(&path).unwrap()
    }

    #[test]
    fn test_parse_attrs_requires_object() {
        assert!(parse_attrs(r#"{"origin": "https://example.com"}"#).is_ok());
        assert!(parse_attrs("[1, 2]").is_err());
        assert!(parse_attrs("{").is_err());
    }

    #[tokio::test]
    async fn test_open_empty_project() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::open(dir.path()).await.unwrap();
        assert!(host.api.calls().is_empty());
        assert!(host.state.load().await.unwrap().instances.is_empty());
    }
}
