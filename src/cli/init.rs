use std::path::PathBuf;

use staffdir::{Config, Directory, storage::directory::CONFIG_DIR};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Init {
    /// Records per page when a listing does not give a limit
    #[arg(long, value_name = "N")]
    page_size: Option<usize>,
}

impl Init {
    #[instrument]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut config = Config::default();
        if let Some(size) = self.page_size {
            config.set_default_page_size(size);
        }

        let directory = Directory::init_with_config(root, config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize staff directory: {e}"))?;

        println!(
            "{}",
            format!(
                "Initialized staff directory in {}",
                directory.root().display()
            )
            .success()
        );
        println!("  Created: {CONFIG_DIR}/config.toml");
        println!("  Created: {}", directory.config().data_file());
        println!();
        println!("Next steps:");
        println!("  staff create --first-name Ada --last-name Lovelace --position CEO");

        Ok(())
    }
}
