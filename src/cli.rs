// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use crate::storage::StorageKind;

#[derive(Parser, Debug, Clone)]
#[command(name = "render-tree")]
#[command(about = "Render tree scene viewer", long_about = None)]
pub struct Cli {
    /// Scene configuration (JSON); the stock scene when omitted
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Override the configured storage strategy
    #[arg(long, value_enum)]
    pub storage: Option<StorageKind>,

    /// Render into a command recorder instead of opening a window
    #[arg(long)]
    pub headless: bool,

    /// Frames to render in headless mode
    #[arg(long, default_value_t = 1)]
    pub frames: u32,

    /// Print the tree after initialization
    #[arg(long)]
    pub dump_tree: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headless_run() {
        let cli = Cli::parse_from(["render-tree", "--headless", "--frames", "3", "--storage", "immediate"]);
        assert!(cli.headless);
        assert_eq!(cli.frames, 3);
        assert_eq!(cli.storage, Some(StorageKind::Immediate));
        assert!(cli.config.is_none());
    }

    #[test]
    fn storage_values_are_kebab_case() {
        let cli = Cli::parse_from(["render-tree", "--storage", "command-list"]);
        assert_eq!(cli.storage, Some(StorageKind::CommandList));
    }
}
