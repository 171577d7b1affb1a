use std::path::PathBuf;

use tracing::instrument;

use super::{FieldArgs, terminal::Colorize};

/// Check fields against the staff rules without storing them.
///
/// Hierarchy and email uniqueness are not checked; those depend on the
/// stored records at the moment of writing.
#[derive(Debug, clap::Parser)]
pub struct Validate {
    #[command(flatten)]
    fields: FieldArgs,
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf, json: bool) -> anyhow::Result<()> {
        let body = self.fields.body()?;
        let api = super::open(root)?;
        let response = api.validate(&body);

        super::finish(response, json, |_| {
            println!("{}", "✅ All fields are valid".success());
        })
    }
}
