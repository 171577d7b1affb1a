use std::path::PathBuf;

use staffdir::api::Data;
use tracing::instrument;

use super::{FieldArgs, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Create {
    #[command(flatten)]
    fields: FieldArgs,
}

impl Create {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf, json: bool) -> anyhow::Result<()> {
        let body = self.fields.body()?;
        let api = super::open(root)?;
        let response = api.create(&body);

        super::finish(response, json, |body| {
            if let Some(Data::Record(view)) = &body.data {
                println!(
                    "{}",
                    format!(
                        "✅ Created staff member #{} ({})",
                        view.id,
                        super::display_name(view)
                    )
                    .success()
                );
            }
        })
    }
}
