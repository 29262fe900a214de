// src/formatter/registry.rs - Command and on-save bindings for configured tools

use super::orchestrator::FormatOrchestrator;
use crate::config::ToolDescriptor;
use crate::host::{Host, TextBuffer};
use crate::subscription::{CompositeSubscription, Subscription};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

/// Owns every binding created for the current tool set. Each `register`
/// releases the previous bindings before creating new ones.
pub struct ToolRegistry {
    host: Rc<dyn Host>,
    orchestrator: Rc<FormatOrchestrator>,
    namespace: String,
    bindings: CompositeSubscription,
    save_bindings: Vec<Rc<RefCell<BufferBindings>>>,
    commands: Vec<String>,
}

/// Per-buffer save bindings of one tool, keyed so a destroyed buffer can
/// drop its own entry.
#[derive(Default)]
struct BufferBindings {
    next_id: u64,
    entries: BTreeMap<u64, CompositeSubscription>,
}

impl BufferBindings {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl ToolRegistry {
    pub fn new(host: Rc<dyn Host>, orchestrator: Rc<FormatOrchestrator>, namespace: &str) -> Self {
        Self {
            host,
            orchestrator,
            namespace: namespace.to_string(),
            bindings: CompositeSubscription::new(),
            save_bindings: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Takes effect on the next `register`.
    pub fn set_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    pub fn register(&mut self, tools: &[ToolDescriptor]) {
        self.teardown();

        for tool in tools {
            let name = format!("{}:{}", self.namespace, tool.name);
            let orchestrator = Rc::clone(&self.orchestrator);
            let command_tool = tool.clone();
            let command = self.host.add_command(
                &name,
                Box::new(move |active: Option<&mut dyn TextBuffer>| {
                    if let Some(buffer) = active {
                        orchestrator.format(buffer, &command_tool, None);
                    }
                }),
            );
            self.bindings.add(command);
            self.commands.push(name);

            if tool.on_save {
                self.bind_on_save(tool);
            }
        }

        log::debug!(
            "registered {} tool(s): {}",
            tools.len(),
            self.commands.join(", ")
        );
    }

    /// One will-save binding per open buffer, released when the buffer is
    /// destroyed or the registry is torn down.
    fn bind_on_save(&mut self, tool: &ToolDescriptor) {
        let per_buffer: Rc<RefCell<BufferBindings>> = Rc::default();
        let observed = Rc::clone(&per_buffer);
        let orchestrator = Rc::clone(&self.orchestrator);
        let tool = tool.clone();

        let observer = self.host.observe_buffers(Box::new(move |buffer: &mut dyn TextBuffer| {
            if !buffer.is_alive() {
                return;
            }
            let mut bindings = CompositeSubscription::new();

            let orchestrator = Rc::clone(&orchestrator);
            let tool = tool.clone();
            bindings.add(buffer.on_will_save(Box::new(
                move |buffer: &mut dyn TextBuffer, save_path: Option<&Path>| {
                    orchestrator.format(buffer, &tool, save_path);
                },
            )));

            let id = observed.borrow_mut().next_id();
            let owner = Rc::downgrade(&observed);
            bindings.add(buffer.on_destroy(Box::new(move || {
                if let Some(owner) = owner.upgrade() {
                    // Dropped outside the borrow; disposing it releases this
                    // very handler
                    let released = owner.borrow_mut().entries.remove(&id);
                    drop(released);
                }
            })));

            observed.borrow_mut().entries.insert(id, bindings);
        }));

        self.bindings.add(observer);
        self.save_bindings.push(Rc::clone(&per_buffer));
        self.bindings.add(Subscription::new(move || {
            let entries = std::mem::take(&mut per_buffer.borrow_mut().entries);
            drop(entries);
        }));
    }

    /// Buffers currently holding an on-save binding, summed over tools.
    pub fn save_binding_count(&self) -> usize {
        self.save_bindings
            .iter()
            .map(|bindings| bindings.borrow().entries.len())
            .sum()
    }

    /// Releases every command and save binding.
    pub fn teardown(&mut self) {
        self.bindings.dispose();
        self.save_bindings.clear();
        self.commands.clear();
    }

    pub fn command_names(&self) -> &[String] {
        &self.commands
    }
}

impl Drop for ToolRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}
