//! The render tree: nodes, the factories that create them and the tree facade.

mod factory;
mod node;
mod render_tree;

pub use factory::{FactoryRegistry, GroupFactory, ModelFactory, NodeFactory};
pub use node::{Behavior, NodeId, RenderBinding, RenderNode};
pub use render_tree::{RenderTree, CONE_CUBE, CONE_CUBE_SPIN, ROOT, SPIDER};
