use crate::formatter::orchestrator::FormatSettings;
use crate::formatter::process::{gopath_bins, tool_env};
use crate::language::GO_SCOPE;
use crate::project::ProjectPaths;
use crate::subscription::{Emitter, Subscription};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config format: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config format: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate format tool name `{0}`")]
    DuplicateTool(String),
    #[error("Format tool `{0}` has an empty command")]
    EmptyCommand(String),
    #[error("Format tool with an empty name")]
    EmptyName,
}

/// One configured formatting tool, e.g. `gofmt` or `goimports`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, alias = "onSave")]
    pub on_save: bool,
}

impl ToolDescriptor {
    pub fn new(name: &str, cmd: &str, args: &[&str], on_save: bool) -> Self {
        Self {
            name: name.to_string(),
            cmd: cmd.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            on_save,
        }
    }

    pub fn gofmt() -> Self {
        Self::new("gofmt", "gofmt", &[], true)
    }
}

fn default_namespace() -> String {
    "golang".to_string()
}

fn default_scope() -> String {
    GO_SCOPE.to_string()
}

fn default_tools() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor::gofmt()]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Command prefix, giving `golang:gofmt` style command names.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default, alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,
    /// Environment overrides for every tool.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Directories prepended to `PATH`.
    #[serde(default)]
    pub path: Vec<PathBuf>,
    /// Also prepend `$GOPATH/bin` for each GOPATH entry.
    #[serde(default = "default_true", alias = "gopathBin")]
    pub gopath_bin: bool,
    #[serde(default = "default_tools", alias = "formatTools")]
    pub format_tools: Vec<ToolDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            scope: default_scope(),
            timeout_ms: None,
            env: HashMap::new(),
            path: Vec::new(),
            gopath_bin: true,
            format_tools: default_tools(),
        }
    }
}

impl Config {
    /// Reads TOML, or JSON when the file has a `.json` extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/go-formatter/config.toml`, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("go-formatter").join("config.toml"))
    }

    /// Loads `path`, else the default location when it exists, else the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::debug!("loading config from {}", path.display());
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for tool in &self.format_tools {
            if tool.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if tool.cmd.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(tool.name.clone()));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(ConfigError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(())
    }

    pub fn command_name(&self, tool: &str) -> String {
        format!("{}:{}", self.namespace, tool)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Environment overrides handed to every tool.
    pub fn tool_env(&self) -> HashMap<String, String> {
        let mut path_dirs = self.path.clone();
        if self.gopath_bin {
            let gopath = self
                .env
                .get("GOPATH")
                .cloned()
                .or_else(|| std::env::var("GOPATH").ok());
            if let Some(gopath) = gopath {
                path_dirs.extend(gopath_bins(&gopath));
            }
        }
        tool_env(&self.env, &path_dirs)
    }

    pub fn format_settings(&self, projects: ProjectPaths) -> FormatSettings {
        FormatSettings {
            scope: self.scope.clone(),
            env: self.tool_env(),
            timeout: self.timeout(),
            projects,
        }
    }
}

pub type ConfigObserver = dyn FnMut(&Config);

/// Current configuration plus observers notified on every change.
#[derive(Clone, Default)]
pub struct ConfigStore {
    current: Rc<RefCell<Config>>,
    observers: Emitter<ConfigObserver>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            current: Rc::new(RefCell::new(config)),
            observers: Emitter::new(),
        }
    }

    pub fn get(&self) -> Config {
        self.current.borrow().clone()
    }

    /// Calls `observer` with the current config now and after every `set`.
    pub fn observe(&self, mut observer: Box<ConfigObserver>) -> Subscription {
        let config = self.get();
        observer(&config);
        self.observers.subscribe(observer)
    }

    pub fn set(&self, config: Config) {
        *self.current.borrow_mut() = config;
        let config = self.get();
        self.observers.emit(|observer| observer(&config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.namespace, "golang");
        assert_eq!(config.scope, "source.go");
        assert_eq!(config.format_tools, vec![ToolDescriptor::gofmt()]);
        assert_eq!(config.command_name("gofmt"), "golang:gofmt");
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(
            r#"
            timeout_ms = 2500

            [env]
            GOFLAGS = "-mod=mod"

            [[format_tools]]
            name = "goimports"
            cmd = "goimports"
            on_save = true

            [[format_tools]]
            name = "gofmt-simplify"
            cmd = "gofmt"
            args = ["-s"]
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.env["GOFLAGS"], "-mod=mod");
        assert_eq!(config.format_tools.len(), 2);
        assert!(config.format_tools[0].on_save);
        assert_eq!(config.format_tools[1].args, vec!["-s"]);
        assert!(!config.format_tools[1].on_save);
        assert_eq!(config.namespace, "golang");
    }

    #[test]
    fn test_from_json_accepts_camel_case() {
        let config = Config::from_json(
            r#"{"formatTools": [{"name": "gofmt", "cmd": "gofmt", "args": ["-e"], "onSave": true}]}"#,
        )
        .unwrap();
        assert_eq!(config.format_tools, vec![ToolDescriptor::new("gofmt", "gofmt", &["-e"], true)]);
    }

    #[test]
    fn test_rejects_duplicate_tools() {
        let err = Config::from_toml(
            r#"
            [[format_tools]]
            name = "gofmt"
            cmd = "gofmt"
            [[format_tools]]
            name = "gofmt"
            cmd = "goimports"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTool(name) if name == "gofmt"));
    }

    #[test]
    fn test_rejects_empty_command() {
        let err = Config::from_toml("[[format_tools]]\nname = \"x\"\ncmd = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand(_)));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&toml_path, "namespace = \"go\"\n").unwrap();
        let json_path = dir.path().join("config.json");
        std::fs::write(&json_path, r#"{"namespace": "gojson"}"#).unwrap();

        assert_eq!(Config::from_file(&toml_path).unwrap().namespace, "go");
        assert_eq!(Config::from_file(&json_path).unwrap().namespace, "gojson");
        assert!(matches!(
            Config::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_env_adds_gopath_bin() {
        let mut config = Config::default();
        config.env.insert("GOPATH".to_string(), "/home/me/go".to_string());
        config.env.insert("PATH".to_string(), "/usr/bin".to_string());
        let env = config.tool_env();
        assert_eq!(env["PATH"], "/home/me/go/bin:/usr/bin");
        assert_eq!(env["GOPATH"], "/home/me/go");
    }

    #[test]
    fn test_store_notifies_observers() {
        let store = ConfigStore::new(Config::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _subscription = store.observe(Box::new(move |config: &Config| {
            sink.borrow_mut().push(config.namespace.clone());
        }));

        let mut next = Config::default();
        next.namespace = "go".to_string();
        store.set(next);

        assert_eq!(*seen.borrow(), vec!["golang".to_string(), "go".to_string()]);
        assert_eq!(store.get().namespace, "go");
    }
}
