// src/workspace.rs - In-process host: open buffers, commands, project roots

use crate::buffer::{Buffer, BufferError};
use crate::host::{BufferObserver, CommandHandler, Host, TextBuffer};
use crate::project::ProjectPaths;
use crate::subscription::{Emitter, Subscription};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

pub type SharedBuffer = Rc<RefCell<Buffer>>;

#[derive(Default)]
pub struct Workspace {
    buffers: RefCell<Vec<SharedBuffer>>,
    active: RefCell<Option<SharedBuffer>>,
    commands: RefCell<BTreeMap<String, Emitter<CommandHandler>>>,
    buffer_observers: Emitter<BufferObserver>,
    projects: ProjectPaths,
}

impl Workspace {
    pub fn new(projects: ProjectPaths) -> Self {
        Self {
            projects,
            ..Default::default()
        }
    }

    /// Adds `buffer`, makes it active and announces it to buffer observers.
    pub fn open(&self, buffer: Buffer) -> SharedBuffer {
        let shared = Rc::new(RefCell::new(buffer));
        self.buffers.borrow_mut().push(Rc::clone(&shared));
        *self.active.borrow_mut() = Some(Rc::clone(&shared));

        self.buffer_observers.emit(|observer| {
            let mut guard = shared.borrow_mut();
            let buffer: &mut dyn TextBuffer = &mut *guard;
            observer(buffer);
        });
        shared
    }

    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<SharedBuffer, BufferError> {
        let mut buffer = Buffer::new();
        buffer.load_from_file(path)?;
        Ok(self.open(buffer))
    }

    pub fn buffers(&self) -> Vec<SharedBuffer> {
        self.buffers.borrow().clone()
    }

    pub fn active_buffer(&self) -> Option<SharedBuffer> {
        self.active.borrow().clone()
    }

    pub fn save(&self, buffer: &SharedBuffer) -> Result<(), BufferError> {
        buffer.borrow_mut().save()
    }

    pub fn save_as<P: AsRef<Path>>(&self, buffer: &SharedBuffer, path: P) -> Result<(), BufferError> {
        buffer.borrow_mut().save_as(path)
    }

    /// Destroys `buffer` and forgets it. The most recently opened remaining
    /// buffer becomes active if the closed one was.
    pub fn close(&self, buffer: &SharedBuffer) {
        buffer.borrow_mut().destroy();
        self.buffers
            .borrow_mut()
            .retain(|open| !Rc::ptr_eq(open, buffer));

        let was_active = self
            .active
            .borrow()
            .as_ref()
            .is_some_and(|active| Rc::ptr_eq(active, buffer));
        if was_active {
            *self.active.borrow_mut() = self.buffers.borrow().last().cloned();
        }
    }

    /// Runs every handler bound to `command` against the active buffer.
    /// Returns false when nothing is bound to it.
    pub fn dispatch(&self, command: &str) -> bool {
        let Some(handlers) = self.commands.borrow().get(command).cloned() else {
            return false;
        };
        if handlers.is_empty() {
            return false;
        }

        let active = self.active_buffer();
        handlers.emit(|handler| match &active {
            Some(shared) => {
                let mut guard = shared.borrow_mut();
                let buffer: &mut dyn TextBuffer = &mut *guard;
                handler(Some(buffer));
            }
            None => handler(None),
        });
        true
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.commands
            .borrow()
            .get(command)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Commands that currently have at least one handler.
    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .filter(|(_, handlers)| !handlers.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl Host for Workspace {
    fn add_command(&self, name: &str, handler: Box<CommandHandler>) -> Subscription {
        let handlers = self
            .commands
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .clone();
        handlers.subscribe(handler)
    }

    fn observe_buffers(&self, mut observer: Box<BufferObserver>) -> Subscription {
        for shared in self.buffers() {
            let mut guard = shared.borrow_mut();
            let buffer: &mut dyn TextBuffer = &mut *guard;
            observer(buffer);
        }
        self.buffer_observers.subscribe(observer)
    }

    fn project_paths(&self) -> ProjectPaths {
        self.projects.clone()
    }
}
