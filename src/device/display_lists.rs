use std::collections::HashMap;
use std::rc::Rc;

use super::{DrawCommand, ListHandle};

/// Display list bookkeeping shared by every [`Device`](super::Device)
///
/// Allocates handles (optionally bounded), captures commands while a list is
/// being compiled and hands out compiled lists for replay.
#[derive(Debug, Default)]
pub struct DisplayLists {
    next_id: u32,
    capacity: Option<usize>,
    lists: HashMap<u32, Rc<[DrawCommand]>>,
    reserved: Vec<u32>,
    compiling: Option<(u32, Vec<DrawCommand>)>,
    generated: usize,
}

impl DisplayLists {
    /// Unbounded list storage
    pub fn new() -> Self {
        Self::default()
    }

    /// List storage that refuses to allocate more than `capacity` live lists
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Allocate a fresh handle, or `ListHandle::INVALID` when at capacity
    pub fn generate(&mut self) -> ListHandle {
        if let Some(capacity) = self.capacity {
            if self.live() >= capacity {
                return ListHandle::INVALID;
            }
        }

        self.next_id += 1;
        self.generated += 1;
        self.reserved.push(self.next_id);
        ListHandle(self.next_id)
    }

    /// Start capturing into `handle`; a list already being compiled is closed first
    pub fn begin(&mut self, handle: ListHandle) {
        if !handle.is_valid() {
            return;
        }
        if self.compiling.is_some() {
            log::warn!("begin_list({}) while another list is compiling", handle.0);
            self.end();
        }
        self.compiling = Some((handle.0, Vec::new()));
    }

    /// Finish the list being compiled
    pub fn end(&mut self) {
        if let Some((id, commands)) = self.compiling.take() {
            self.reserved.retain(|&r| r != id);
            self.lists.insert(id, commands.into());
        }
    }

    /// Capture `command` if a list is compiling, otherwise hand it back for execution
    pub fn capture(&mut self, command: DrawCommand) -> Option<DrawCommand> {
        match &mut self.compiling {
            Some((_, commands)) => {
                commands.push(command);
                None
            }
            None => Some(command),
        }
    }

    /// Compiled commands of `handle`, if any
    pub fn commands(&self, handle: ListHandle) -> Option<Rc<[DrawCommand]>> {
        self.lists.get(&handle.0).cloned()
    }

    pub fn delete(&mut self, handle: ListHandle) {
        self.lists.remove(&handle.0);
        self.reserved.retain(|&r| r != handle.0);
    }

    pub fn is_compiling(&self) -> bool {
        self.compiling.is_some()
    }

    /// Handles currently allocated (compiled or merely generated)
    pub fn live(&self) -> usize {
        self.lists.len() + self.reserved.len()
    }

    /// Total handles ever allocated
    pub fn generated(&self) -> usize {
        self.generated
    }
}
