use std::path::PathBuf;

use dialoguer::Confirm;
use staffdir::api::Data;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Delete {
    /// The ID of the staff member to delete
    id: u64,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf, json: bool) -> anyhow::Result<()> {
        let api = super::open(root)?;

        if !self.yes && !json {
            let name = match api.get(self.id).body.data {
                Some(Data::Record(view)) => super::display_name(&view),
                _ => format!("#{}", self.id),
            };
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete staff member {name}?"))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Cancelled".dim());
                return Ok(());
            }
        }

        let response = api.delete(self.id);
        super::finish(response, json, |_| {
            println!(
                "{}",
                format!("✅ Deleted staff member #{}", self.id).success()
            );
        })
    }
}
