// src/integration.rs - Activation and teardown of the formatter integration

use crate::config::{Config, ConfigStore};
use crate::formatter::diagnostics::DiagnosticSink;
use crate::formatter::orchestrator::{FormatOrchestrator, FormatSettings};
use crate::formatter::process::ProcessRunner;
use crate::formatter::registry::ToolRegistry;
use crate::host::Host;
use crate::subscription::Subscription;
use std::cell::RefCell;
use std::rc::Rc;

/// The single live instance of the integration: one orchestrator, one
/// registry, and the config observer that keeps the registry current.
pub struct Integration {
    orchestrator: Rc<FormatOrchestrator>,
    registry: Rc<RefCell<ToolRegistry>>,
    config_subscription: Subscription,
}

impl Integration {
    pub fn activate(host: Rc<dyn Host>, config: &ConfigStore, runner: Box<dyn ProcessRunner>) -> Self {
        let initial = config.get();
        let orchestrator = Rc::new(FormatOrchestrator::new(runner, FormatSettings::default()));
        let registry = Rc::new(RefCell::new(ToolRegistry::new(
            Rc::clone(&host),
            Rc::clone(&orchestrator),
            &initial.namespace,
        )));

        let observer_registry = Rc::clone(&registry);
        let observer_orchestrator = Rc::clone(&orchestrator);
        let config_subscription = config.observe(Box::new(move |config: &Config| {
            observer_orchestrator.update_settings(config.format_settings(host.project_paths()));
            let mut registry = observer_registry.borrow_mut();
            registry.set_namespace(&config.namespace);
            registry.register(&config.format_tools);
            log::info!("formatter tools: {}", registry.command_names().join(", "));
        }));

        Self {
            orchestrator,
            registry,
            config_subscription,
        }
    }

    pub fn set_diagnostic_sink(&self, sink: Box<dyn DiagnosticSink>) {
        self.orchestrator.set_diagnostic_sink(sink);
    }

    pub fn orchestrator(&self) -> &FormatOrchestrator {
        &self.orchestrator
    }

    pub fn command_names(&self) -> Vec<String> {
        self.registry.borrow().command_names().to_vec()
    }

    pub fn is_active(&self) -> bool {
        !self.config_subscription.is_disposed()
    }

    /// Stops observing configuration and releases every binding.
    pub fn deactivate(&mut self) {
        if !self.is_active() {
            return;
        }
        self.config_subscription.dispose();
        self.registry.borrow_mut().teardown();
        self.orchestrator.take_diagnostic_sink();
    }
}

impl Drop for Integration {
    fn drop(&mut self) {
        self.deactivate();
    }
}
