use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use render_tree::cli::Cli;
use render_tree::config::SceneConfig;
use render_tree::device::CommandRecorder;
use render_tree::frame::FrameIterator;
use render_tree::tree::RenderTree;
use render_tree::viewer;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    if let Some(storage) = cli.storage {
        config.storage = storage;
    }
    let max_display_lists = config.max_display_lists;

    let mut tree = RenderTree::from_config(config)?;
    tree.initialize().context("Failed to initialize render tree")?;

    if cli.dump_tree {
        print!("{}", tree.describe());
    }

    if cli.headless {
        run_headless(&mut tree, max_display_lists, cli.frames)
    } else {
        viewer::run(tree, max_display_lists)
    }
}

/// Render a fixed number of frames into a recorder and report what was drawn
fn run_headless(tree: &mut RenderTree, max_display_lists: Option<usize>, frames: u32) -> Result<()> {
    let mut recorder = match max_display_lists {
        Some(capacity) => CommandRecorder::with_list_capacity(capacity),
        None => CommandRecorder::new(),
    };
    tree.load_resources(&mut recorder)?;

    for frame in FrameIterator::fixed(Duration::from_millis(16)).take(frames as usize) {
        recorder.clear_log();
        tree.animate(frame.delta);
        tree.render(&mut recorder);

        let stats = recorder.stats();
        println!(
            "frame {}: {} commands, {} triangles, {} list calls, max depth {}",
            frame.number, stats.commands, stats.triangles, stats.list_calls, stats.max_depth
        );
    }

    tree.release_resources(&mut recorder);
    Ok(())
}
