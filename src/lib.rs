pub mod camera;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod loaders;
pub mod model;
pub mod storage;
pub mod tree;
pub mod viewer;

pub use error::{Result, SceneError};
pub use tree::{RenderNode, RenderTree};
