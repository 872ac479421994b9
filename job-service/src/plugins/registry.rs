// Plugin Registry
// Maps declared kind strings to plugin implementations

use crate::actions::{CommandAction, CoberturaAction, LogAction, ScriptAction, SimplecovAction};
use crate::job::SerializedAction;
use crate::plugins::{
    Action, ActionArgs, ActionError, Builder, GitSource, LocalBuilder, LocalProvisioner,
    LocalTransportPlugin, Provisioner, Source, TransportPlugin,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds an action from its serialized arguments
pub type ActionFactory =
    Arc<dyn Fn(&ActionArgs) -> Result<Box<dyn Action>, ActionError> + Send + Sync>;

/// Creates a fresh builder for one execution attempt
pub type BuilderFactory = Arc<dyn Fn() -> Box<dyn Builder> + Send + Sync>;

/// Plugin categories, each with its own namespace of names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Action,
    Builder,
    Transport,
    Provisioner,
    Source,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Action => "action",
            PluginKind::Builder => "builder",
            PluginKind::Transport => "transport",
            PluginKind::Provisioner => "provisioner",
            PluginKind::Source => "source",
        };
        f.write_str(name)
    }
}

/// Registry of available plugins.
///
/// Built once at process start and shared by reference with job resolution
/// and every runner.
#[derive(Default)]
pub struct PluginRegistry {
    actions: HashMap<String, ActionFactory>,
    builders: HashMap<String, BuilderFactory>,
    transports: HashMap<String, Arc<dyn TransportPlugin>>,
    provisioners: HashMap<String, Arc<dyn Provisioner>>,
    sources: HashMap<String, Arc<dyn Source>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every plugin this crate ships
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_action("command", |args| {
            Ok(Box::new(CommandAction::from_args(args)?) as Box<dyn Action>)
        });
        registry.register_action("script", |args| {
            Ok(Box::new(ScriptAction::from_args(args)?) as Box<dyn Action>)
        });
        registry.register_action("log", |args| {
            Ok(Box::new(LogAction::from_args(args)?) as Box<dyn Action>)
        });
        registry.register_action("simplecov", |args| {
            Ok(Box::new(SimplecovAction::from_args(args)?) as Box<dyn Action>)
        });
        registry.register_action("cobertura", |args| {
            Ok(Box::new(CoberturaAction::from_args(args)?) as Box<dyn Action>)
        });

        registry.register_builder("local", || Box::new(LocalBuilder::new()) as Box<dyn Builder>);
        registry.register_transport("local", Arc::new(LocalTransportPlugin));
        registry.register_provisioner("local", Arc::new(LocalProvisioner));
        registry.register_source("git", Arc::new(GitSource));

        registry
    }

    pub fn register_action<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ActionArgs) -> Result<Box<dyn Action>, ActionError> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(factory));
    }

    pub fn register_builder<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Builder> + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Arc::new(factory));
    }

    pub fn register_transport(&mut self, name: impl Into<String>, plugin: Arc<dyn TransportPlugin>) {
        self.transports.insert(name.into(), plugin);
    }

    pub fn register_provisioner(&mut self, distro: impl Into<String>, plugin: Arc<dyn Provisioner>) {
        self.provisioners.insert(distro.into(), plugin);
    }

    pub fn register_source(&mut self, kind: impl Into<String>, plugin: Arc<dyn Source>) {
        self.sources.insert(kind.into(), plugin);
    }

    /// Whether a plugin of the given kind is registered under `name`
    pub fn find(&self, name: &str, kind: PluginKind) -> bool {
        match kind {
            PluginKind::Action => self.actions.contains_key(name),
            PluginKind::Builder => self.builders.contains_key(name),
            PluginKind::Transport => self.transports.contains_key(name),
            PluginKind::Provisioner => self.provisioners.contains_key(name),
            PluginKind::Source => self.sources.contains_key(name),
        }
    }

    /// Instantiate the action a serialized step describes
    pub fn create_action(&self, action: &SerializedAction) -> Result<Box<dyn Action>, ActionError> {
        let factory = self
            .actions
            .get(&action.kind)
            .ok_or_else(|| ActionError::UnknownAction(action.kind.clone()))?;
        factory(&action.args)
    }

    pub fn create_builder(&self, name: &str) -> Option<Box<dyn Builder>> {
        self.builders.get(name).map(|factory| factory())
    }

    pub fn transport(&self, name: &str) -> Option<Arc<dyn TransportPlugin>> {
        self.transports.get(name).cloned()
    }

    pub fn provisioner(&self, distro: &str) -> Option<Arc<dyn Provisioner>> {
        self.provisioners.get(distro).cloned()
    }

    pub fn source(&self, kind: &str) -> Option<Arc<dyn Source>> {
        self.sources.get(kind).cloned()
    }

    /// Registered names of one kind, sorted
    pub fn names(&self, kind: PluginKind) -> Vec<String> {
        let mut names: Vec<String> = match kind {
            PluginKind::Action => self.actions.keys().cloned().collect(),
            PluginKind::Builder => self.builders.keys().cloned().collect(),
            PluginKind::Transport => self.transports.keys().cloned().collect(),
            PluginKind::Provisioner => self.provisioners.keys().cloned().collect(),
            PluginKind::Source => self.sources.keys().cloned().collect(),
        };
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_registered() {
        let registry = PluginRegistry::with_defaults();
        assert!(registry.find("command", PluginKind::Action));
        assert!(registry.find("local", PluginKind::Builder));
        assert!(registry.find("local", PluginKind::Transport));
        assert!(registry.find("local", PluginKind::Provisioner));
        assert!(registry.find("git", PluginKind::Source));
        assert!(!registry.find("ssh", PluginKind::Transport));
        assert_eq!(
            registry.names(PluginKind::Action),
            vec!["cobertura", "command", "log", "script", "simplecov"]
        );
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let registry = PluginRegistry::with_defaults();
        assert!(!registry.find("git", PluginKind::Action));
        assert!(!registry.find("command", PluginKind::Source));
    }

    #[test]
    fn test_create_action() {
        let registry = PluginRegistry::with_defaults();
        let action: SerializedAction =
            serde_json::from_value(json!({"action": "command", "cmd": "/bin/true"})).unwrap();
        assert!(registry.create_action(&action).is_ok());

        let unknown: SerializedAction =
            serde_json::from_value(json!({"action": "email", "to": "dev@example.com"})).unwrap();
        assert!(matches!(
            registry.create_action(&unknown),
            Err(ActionError::UnknownAction(name)) if name == "email"
        ));
    }

    #[test]
    fn test_create_action_validates_arguments() {
        let registry = PluginRegistry::with_defaults();
        let action: SerializedAction =
            serde_json::from_value(json!({"action": "command"})).unwrap();
        assert!(matches!(
            registry.create_action(&action),
            Err(ActionError::InvalidArguments { .. })
        ));
    }
}
