//! How a model gets onto the device and drawn.
//!
//! A [`StorageStrategy`] is created once per model type and shared by every
//! render node of that type, so its methods take `&self`; the command-list
//! variant keeps its device handle in a `Cell`.

mod command_list;
mod immediate;

pub use command_list::CommandListStorage;
pub use immediate::{draw_model, ImmediateStorage};

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::Result;
use crate::model::Model;

/// Available storage strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Re-submit every vertex each frame
    Immediate,
    /// Compile once into a display list and replay it
    #[default]
    CommandList,
}

impl StorageKind {
    /// Build a shared strategy of this kind for `model`
    pub fn instantiate(self, model: Rc<Model>) -> Rc<dyn StorageStrategy> {
        match self {
            StorageKind::Immediate => Rc::new(ImmediateStorage::new(model)),
            StorageKind::CommandList => Rc::new(CommandListStorage::new(model)),
        }
    }
}

/// Load / draw / release lifecycle of a model's device representation
pub trait StorageStrategy {
    fn kind(&self) -> StorageKind;

    /// Model drawn by this strategy
    fn model(&self) -> &Rc<Model>;

    /// Ensure device resources exist; calling it again once loaded does nothing
    fn load(&self, device: &mut dyn Device) -> Result<()>;

    /// Issue draw commands; a no-op when the strategy is not loaded
    fn draw(&self, device: &mut dyn Device);

    /// Free device resources; safe without a prior `load` and safe to repeat
    fn release(&self, device: &mut dyn Device);

    /// Whether `draw` will produce output
    fn is_loaded(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::primitives;

    #[test]
    fn instantiate_matches_kind() {
        let model = Rc::new(primitives::flat_triangle());
        for kind in [StorageKind::Immediate, StorageKind::CommandList] {
            let storage = kind.instantiate(model.clone());
            assert_eq!(storage.kind(), kind);
            assert!(Rc::ptr_eq(storage.model(), &model));
        }
    }

    #[test]
    fn storage_kind_round_trips_through_json() {
        let kind: StorageKind = serde_json::from_str("\"immediate\"").unwrap();
        assert_eq!(kind, StorageKind::Immediate);
        assert_eq!(StorageKind::default(), StorageKind::CommandList);
    }
}
