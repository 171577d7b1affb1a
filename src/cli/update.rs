use std::path::PathBuf;

use staffdir::api::Data;
use tracing::instrument;

use super::{FieldArgs, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Update {
    /// The ID of the staff member to change
    id: u64,

    /// Fields to overwrite; anything not given is left as it is
    #[command(flatten)]
    fields: FieldArgs,
}

impl Update {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf, json: bool) -> anyhow::Result<()> {
        let body = self.fields.body()?;
        let api = super::open(root)?;
        let response = api.update(self.id, &body);

        super::finish(response, json, |body| {
            if let Some(Data::Record(view)) = &body.data {
                println!(
                    "{}",
                    format!("✅ Updated staff member #{}", view.id).success()
                );
                super::print_record(view);
            }
        })
    }
}
