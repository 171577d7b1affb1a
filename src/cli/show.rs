use std::path::PathBuf;

use staffdir::api::Data;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Show {
    /// The ID of the staff member to display
    id: u64,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf, json: bool) -> anyhow::Result<()> {
        let api = super::open(root)?;
        let response = api.get(self.id);

        super::finish(response, json, |body| {
            let Some(Data::Record(view)) = &body.data else {
                return;
            };
            super::print_record(view);

            if view.pid != 0 {
                if let Some(Data::Record(manager)) = api.get(view.pid).body.data {
                    println!(
                        "  {:<11} {}",
                        "Reports to:".dim(),
                        super::display_name(&manager)
                    );
                }
            }
        })
    }
}
