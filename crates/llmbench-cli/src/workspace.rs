//! The `llmbench.yaml` workspace file: engine settings plus the providers,
//! tasks and collections the engine reads through its store traits.

use anyhow::{bail, Context};
use llmbench_core::model::BenchmarkTask;
use llmbench_core::providers::{InMemoryProviderStore, ProviderConfig};
use llmbench_core::tasks::{InMemoryTaskStore, TaskCollection};
use llmbench_core::EngineConfig;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Workspace {
    pub engine: EngineConfig,
    pub providers: Vec<ProviderConfig>,
    pub tasks: Vec<BenchmarkTask>,
    /// Collection id to ordered task ids.
    pub collections: BTreeMap<String, Vec<String>>,
}

impl Workspace {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read workspace file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid workspace file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Self::from_yaml_with(raw, |name| std::env::var(name).ok())
    }

    fn from_yaml_with(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut ws: Workspace = serde_yaml::from_str(raw).context("failed to parse workspace yaml")?;
        ws.engine.validate().context("invalid engine settings")?;

        let mut seen = HashSet::new();
        for provider in &mut ws.providers {
            if !seen.insert(provider.id.clone()) {
                bail!("duplicate provider id '{}'", provider.id);
            }
            for header in &mut provider.headers {
                header.value = expand_env(&header.value, &lookup).with_context(|| {
                    format!("provider {}: header '{}'", provider.id, header.key)
                })?;
            }
            provider
                .inference_url()
                .with_context(|| format!("provider {}", provider.id))?;
        }
        Ok(ws)
    }

    pub fn provider_store(&self) -> InMemoryProviderStore {
        InMemoryProviderStore::new(self.providers.iter().cloned())
    }

    pub fn task_store(&self) -> anyhow::Result<InMemoryTaskStore> {
        let collections = self.collections.iter().map(|(id, tasks)| TaskCollection {
            id: id.clone(),
            name: None,
            tasks: tasks.clone(),
        });
        InMemoryTaskStore::new(self.tasks.iter().cloned(), collections)
            .context("invalid tasks or collections")
    }
}

/// Replaces every `${VAR}` with the variable's value. `$` not followed by `{`
/// is kept as is; an unset variable is an error.
fn expand_env(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("unterminated '${{' in '{}'", value))?;
        let name = &after[..end];
        if name.is_empty() {
            bail!("empty variable name in '{}'", value);
        }
        let resolved = lookup(name).with_context(|| format!("environment variable {} is not set", name))?;
        out.push_str(&resolved);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmbench_core::providers::ProviderType;
    use llmbench_core::tasks::TaskStore;

    const SAMPLE: &str = r#"
engine:
  retry:
    max_attempts: 5
  workers:
    task_workers: 8
providers:
  - id: openai
    type: OPENAI
    base_url: https://api.openai.com
    headers:
      - key: Authorization
        value: "Bearer ${OPENAI_API_KEY}"
        secret: true
  - id: local
    type: OLLAMA
    base_url: http://localhost:11434
tasks:
  - id: capital-fr
    category: geography
    question: What is the capital of France?
    expected:
      excellent: Paris
      good: paris
      pass: The capital is Paris
    incorrect_answer_direction: Any city other than Paris
  - id: boiling
    question: At what temperature does water boil at sea level?
    expected:
      excellent: 100 degrees Celsius
      good: 100C
      pass: about a hundred degrees
collections:
  core: [capital-fr, boiling]
  geo: [capital-fr]
"#;

    fn env(name: &str) -> Option<String> {
        match name {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        }
    }

    #[test]
    fn loads_sample_workspace() {
        let ws = Workspace::from_yaml_with(SAMPLE, env).unwrap();
        assert_eq!(ws.engine.retry.max_attempts, 5);
        assert_eq!(ws.engine.workers.task_workers, 8);
        // untouched sections keep their defaults
        assert_eq!(ws.engine.lease, EngineConfig::default().lease);

        assert_eq!(ws.providers.len(), 2);
        assert_eq!(ws.providers[0].provider_type, ProviderType::OpenAi);
        assert_eq!(ws.providers[0].headers[0].value, "Bearer sk-test");
        assert!(ws.providers[0].headers[0].secret);

        let tasks = ws.task_store().unwrap();
        let core: Vec<String> = tasks
            .list_tasks_in_collection("core")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(core, vec!["capital-fr", "boiling"]);
        assert_eq!(tasks.collection_ids(), vec!["core", "geo"]);
    }

    #[test]
    fn unset_variable_is_an_error() {
        let err = Workspace::from_yaml_with(SAMPLE, |_| None).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("OPENAI_API_KEY"), "{}", msg);
        assert!(!msg.contains("sk-"), "{}", msg);
    }

    #[test]
    fn expand_env_cases() {
        let lookup = |name: &str| (name == "A").then(|| "1".to_string());
        assert_eq!(expand_env("plain", &lookup).unwrap(), "plain");
        assert_eq!(expand_env("$A ${A}-${A}", &lookup).unwrap(), "$A 1-1");
        assert!(expand_env("${A", &lookup).is_err());
        assert!(expand_env("${}", &lookup).is_err());
        assert!(expand_env("${B}", &lookup).is_err());
    }

    #[test]
    fn duplicate_provider_rejected() {
        let yaml = r#"
providers:
  - { id: p, type: OLLAMA, base_url: "http://a" }
  - { id: p, type: LM_STUDIO, base_url: "http://b" }
"#;
        let err = Workspace::from_yaml_with(yaml, env).unwrap_err();
        assert!(err.to_string().contains("duplicate provider id"));
    }

    #[test]
    fn invalid_engine_settings_rejected() {
        let yaml = "engine:\n  retry:\n    max_attempts: 0\n";
        assert!(Workspace::from_yaml_with(yaml, env).is_err());
    }

    #[test]
    fn dangling_collection_reference_rejected() {
        let yaml = "collections:\n  core: [ghost]\n";
        let ws = Workspace::from_yaml_with(yaml, env).unwrap();
        assert!(ws.task_store().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workspace::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read workspace file"));
    }
}
