use std::rc::Rc;

use glam::Vec3;
use render_tree::device::{CommandRecorder, DrawCommand, PolygonMode};
use render_tree::model::primitives;
use render_tree::storage::StorageKind;
use render_tree::tree::{RenderBinding, RenderNode};

fn triangle_node(tag: &str) -> RenderNode {
    let storage = StorageKind::Immediate.instantiate(Rc::new(primitives::flat_triangle()));
    RenderNode::new(tag).with_binding(RenderBinding::new(storage))
}

/// root -> a -> (b, c -> d)
fn sample_tree() -> RenderNode {
    let mut c = RenderNode::new("c");
    c.add(RenderNode::new("d")).unwrap();

    let mut a = RenderNode::new("a");
    a.add(RenderNode::new("b")).unwrap();
    a.add(c).unwrap();

    let mut root = RenderNode::new("root");
    root.add(a).unwrap();
    root
}

/// Straight chain of `depth` drawable nodes; bit i of `hidden` hides level i
fn chain(depth: usize, hidden: u32) -> RenderNode {
    let mut node: Option<RenderNode> = None;
    for level in (0..depth).rev() {
        let mut parent = triangle_node(&format!("level{level}"));
        parent.set_visible(hidden & (1 << level) == 0);
        if let Some(child) = node.take() {
            parent.add(child).unwrap();
        }
        node = Some(parent);
    }
    node.unwrap()
}

fn begin_count(recorder: &CommandRecorder) -> usize {
    recorder.count(|c| *c == DrawCommand::BeginTriangles)
}

#[cfg(test)]
mod node_tests {
    use super::*;

    #[test]
    fn test_depth_counts_levels() {
        assert_eq!(RenderNode::new("leaf").depth(), 1);
        assert_eq!(sample_tree().depth(), 4);
    }

    #[test]
    fn test_find_is_pre_order_and_includes_self() {
        let mut root = sample_tree();
        root.child_mut(0).unwrap().add(RenderNode::new("d")).unwrap();

        assert_eq!(root.find("root").unwrap().id(), root.id());
        // the d under c comes before the one appended last to a
        let c = root.find("c").unwrap();
        let first_d = root.find("d").unwrap();
        assert_eq!(first_d.parent(), Some(c.id()));
        assert!(root.find("missing").is_none());
    }

    #[test]
    fn test_child_by_index() {
        let root = sample_tree();
        let a = root.child(0).unwrap();
        assert_eq!(a.tag(), "a");
        assert_eq!(a.child(1).unwrap().tag(), "c");
        assert!(a.child(2).is_none());
        assert_eq!(a.count_children(), 2);
    }

    #[test]
    fn test_clear_keeps_binding() {
        let mut node = triangle_node("n");
        node.add(RenderNode::new("child")).unwrap();
        node.clear();
        assert_eq!(node.count_children(), 0);
        assert!(node.binding().is_some());
    }

    #[test]
    fn test_erase_grandchild_removes_subtree() {
        let mut root = sample_tree();
        let c = root.find("c").unwrap().id();

        assert!(root.erase(c));
        assert!(root.find("c").is_none());
        assert!(root.find("d").is_none());
        assert!(root.find("b").is_some());
        assert!(!root.erase(c));
    }

    #[test]
    fn test_erase_keeps_other_nodes_sharing_the_tag() {
        let mut root = RenderNode::new("root");
        let first = root.add(RenderNode::new("twin")).unwrap();
        let second = root.add(RenderNode::new("twin")).unwrap();

        assert!(root.erase(first));
        assert_eq!(root.find("twin").unwrap().id(), second);
    }

    #[test]
    fn test_clear_selection_leaves_nothing_selected() {
        let mut root = sample_tree();
        root.select_all();
        assert!(root.has_selection());

        root.clear_selection();
        assert!(!root.has_selection());
    }

    #[test]
    fn test_select_all_selects_every_selectable_node() {
        let mut root = sample_tree();
        assert!(!root.has_selection());

        root.select_all();
        let mut all = true;
        root.walk(&mut |n| all &= n.is_selected());
        assert!(all);
    }

    #[test]
    fn test_unselectable_nodes_ignore_selection() {
        let mut root = sample_tree();
        root.walk_mut(&mut |n| n.set_selectable(false));

        root.select_all();
        assert!(!root.has_selection());

        let d = root.find_mut("d").unwrap();
        d.toggle_selection();
        d.set_selected(true);
        assert!(!d.is_selected());
    }

    #[test]
    fn test_has_selection_sees_deep_descendants() {
        let mut root = sample_tree();
        root.find_mut("d").unwrap().toggle_selection();
        assert!(root.has_selection());
        assert!(!root.find("b").unwrap().has_selection());
    }

    #[test]
    fn test_toggle_selection_is_not_recursive() {
        let mut root = sample_tree();
        root.toggle_selection();
        assert!(root.is_selected());
        assert!(!root.child(0).unwrap().is_selected());
    }

    #[test]
    fn test_erase_selection_removes_selected_subtrees() {
        let mut root = sample_tree();
        root.find_mut("c").unwrap().toggle_selection();
        root.find_mut("b").unwrap().toggle_selection();

        assert_eq!(root.erase_selection(), 2);
        assert_eq!(root.find("a").unwrap().count_children(), 0);
        assert!(root.find("d").is_none());
    }

    #[test]
    fn test_polygon_mode_propagates_but_skips_forced_nodes() {
        let mut root = sample_tree();
        root.find_mut("c").unwrap().force_polygon_mode(true);

        root.set_polygon_mode(PolygonMode::Line);
        assert_eq!(root.find("b").unwrap().polygon_mode(), PolygonMode::Line);
        assert_eq!(root.find("c").unwrap().polygon_mode(), PolygonMode::Fill);
        assert_eq!(root.find("d").unwrap().polygon_mode(), PolygonMode::Fill);

        root.force_polygon_mode(false);
        root.set_polygon_mode(PolygonMode::Line);
        assert_eq!(root.find("d").unwrap().polygon_mode(), PolygonMode::Line);
    }

    #[test]
    fn test_node_polygon_mode_applies_to_its_geometry() {
        let mut tree = chain(3, 0);
        tree.set_polygon_mode(PolygonMode::Line);
        tree.child_mut(0).unwrap().force_polygon_mode(true);
        tree.child_mut(0).unwrap().cycle_polygon_mode(true);

        let mut recorder = CommandRecorder::new();
        tree.render(&mut recorder);
        // level1 and level2 were cycled back to fill; level0 keeps line
        assert_eq!(
            recorder.batch_modes(),
            &[PolygonMode::Line, PolygonMode::Fill, PolygonMode::Fill]
        );
    }

    #[test]
    fn test_cycle_polygon_mode_marks_selection_forced() {
        let mut root = sample_tree();
        root.find_mut("b").unwrap().toggle_selection();

        root.cycle_polygon_mode(false);
        let b = root.find("b").unwrap();
        assert_eq!(b.polygon_mode(), PolygonMode::Line);
        assert!(b.is_polygon_mode_forced());
        assert_eq!(root.find("c").unwrap().polygon_mode(), PolygonMode::Fill);

        root.cycle_polygon_mode(true);
        assert_eq!(root.find("b").unwrap().polygon_mode(), PolygonMode::Fill);
        assert_eq!(root.find("c").unwrap().polygon_mode(), PolygonMode::Line);
    }

    #[test]
    fn test_render_push_pop_balanced_for_every_visibility() {
        for depth in 1..=5 {
            for hidden in 0..(1u32 << depth) {
                let tree = chain(depth, hidden);
                let mut recorder = CommandRecorder::new();
                tree.render(&mut recorder);

                let stats = recorder.stats();
                assert_eq!(stats.pushes, stats.pops, "depth {depth}, hidden {hidden:b}");
                assert_eq!(stats.underflows, 0);
                assert_eq!(recorder.depth(), 0);
            }
        }
    }

    #[test]
    fn test_invisible_node_hides_whole_subtree() {
        let mut tree = chain(4, 0);
        tree.child_mut(0).unwrap().set_visible(false);

        let mut recorder = CommandRecorder::new();
        tree.render(&mut recorder);
        // only the top level draws, even though deeper levels are visible
        assert_eq!(begin_count(&recorder), 1);
    }

    #[test]
    fn test_invisible_root_touches_nothing() {
        let tree = chain(3, 0b001);
        let mut recorder = CommandRecorder::new();
        tree.render(&mut recorder);
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_children_render_in_sibling_order_inside_parent_transform() {
        let mut root = RenderNode::new("root").with_position(Vec3::X);
        root.add(RenderNode::new("first").with_position(Vec3::Y)).unwrap();
        root.add(RenderNode::new("second").with_position(Vec3::Z)).unwrap();

        let mut recorder = CommandRecorder::new();
        root.render(&mut recorder);

        let translations: Vec<Vec3> = recorder
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Translate(t) => Some(*t),
                _ => None,
            })
            .collect();
        assert_eq!(translations, vec![Vec3::X, Vec3::Y, Vec3::Z]);
        assert_eq!(recorder.stats().max_depth, 2);
    }

    #[test]
    fn test_animate_does_not_recurse() {
        use render_tree::tree::Behavior;

        let mut parent = triangle_node("p").with_behavior(Behavior::spin(Vec3::Y, 10.0));
        parent
            .add(triangle_node("c").with_behavior(Behavior::spin(Vec3::Y, 10.0)))
            .unwrap();

        parent.animate(1.0);
        assert!(matches!(parent.behavior(), Behavior::Spin { angle, .. } if *angle == 10.0));
        assert!(matches!(parent.child(0).unwrap().behavior(), Behavior::Spin { angle, .. } if *angle == 0.0));
    }
}
