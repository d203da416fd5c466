use std::cell::Cell;
use std::rc::Rc;

use super::{draw_model, StorageKind, StorageStrategy};
use crate::device::{Device, ListHandle};
use crate::error::{Result, SceneError};
use crate::model::Model;

/// Compiles the immediate draw sequence into a display list once and replays it
pub struct CommandListStorage {
    model: Rc<Model>,
    handle: Cell<ListHandle>,
}

impl CommandListStorage {
    pub fn new(model: Rc<Model>) -> Self {
        Self {
            model,
            handle: Cell::new(ListHandle::INVALID),
        }
    }

    /// Device handle of the compiled list, `ListHandle::INVALID` when not loaded
    pub fn handle(&self) -> ListHandle {
        self.handle.get()
    }
}

impl StorageStrategy for CommandListStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::CommandList
    }

    fn model(&self) -> &Rc<Model> {
        &self.model
    }

    fn load(&self, device: &mut dyn Device) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let handle = device.gen_list();
        if !handle.is_valid() {
            return Err(SceneError::DeviceResourceExhausted(self.model.name.clone()));
        }

        device.begin_list(handle);
        draw_model(&self.model, device);
        device.end_list();

        log::debug!("compiled `{}` into display list {}", self.model.name, handle.0);
        self.handle.set(handle);
        Ok(())
    }

    fn draw(&self, device: &mut dyn Device) {
        let handle = self.handle.get();
        if handle.is_valid() {
            device.call_list(handle);
        }
    }

    fn release(&self, device: &mut dyn Device) {
        let handle = self.handle.replace(ListHandle::INVALID);
        if handle.is_valid() {
            device.delete_list(handle);
            log::debug!("released display list {} of `{}`", handle.0, self.model.name);
        }
    }

    fn is_loaded(&self) -> bool {
        self.handle.get().is_valid()
    }
}

impl Drop for CommandListStorage {
    fn drop(&mut self) {
        if self.is_loaded() {
            log::warn!(
                "display list {} of `{}` dropped while still resident on the device",
                self.handle.get().0,
                self.model.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CommandRecorder, DrawCommand};
    use crate::model::primitives;

    fn storage() -> CommandListStorage {
        CommandListStorage::new(Rc::new(primitives::cone_cube()))
    }

    #[test]
    fn draw_before_load_is_a_no_op() {
        let storage = storage();
        let mut recorder = CommandRecorder::new();
        storage.draw(&mut recorder);
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn load_compiles_without_drawing() {
        let storage = storage();
        let mut recorder = CommandRecorder::new();
        storage.load(&mut recorder).unwrap();
        assert!(storage.is_loaded());
        assert!(recorder.commands().is_empty());
        assert_eq!(recorder.lists().live(), 1);
    }

    #[test]
    fn draw_replays_the_compiled_list() {
        let storage = storage();
        let mut recorder = CommandRecorder::new();
        storage.load(&mut recorder).unwrap();
        storage.draw(&mut recorder);
        assert_eq!(recorder.commands()[0], DrawCommand::CallList(storage.handle()));
        assert_eq!(recorder.count(|c| *c == DrawCommand::BeginTriangles), 2);
    }

    #[test]
    fn exhausted_device_reports_an_error() {
        let storage = storage();
        let mut recorder = CommandRecorder::with_list_capacity(0);
        let err = storage.load(&mut recorder).unwrap_err();
        assert_eq!(err, SceneError::DeviceResourceExhausted("cone_cube".to_string()));
        assert!(!storage.is_loaded());
    }

    #[test]
    fn release_resets_to_invalid() {
        let storage = storage();
        let mut recorder = CommandRecorder::new();
        storage.load(&mut recorder).unwrap();
        storage.release(&mut recorder);
        assert_eq!(storage.handle(), ListHandle::INVALID);
        assert_eq!(recorder.lists().live(), 0);
        storage.release(&mut recorder);
    }
}
