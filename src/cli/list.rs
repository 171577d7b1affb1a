use std::{collections::BTreeMap, path::PathBuf};

use staffdir::{ListQuery, api::Data};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct List {
    /// Page number, starting at 1
    #[arg(long)]
    page: Option<usize>,

    /// Records per page (defaults to the configured page size)
    #[arg(long)]
    limit: Option<usize>,

    /// Match first or last names containing this text
    #[arg(long, short)]
    search: Option<String>,

    /// Match this exact job title
    #[arg(long, short)]
    position: Option<String>,

    /// Filter by ID
    #[arg(long)]
    id: Option<String>,

    /// Filter by email, matching anywhere in the address
    #[arg(long)]
    email: Option<String>,

    /// Filter by last name prefix
    #[arg(long)]
    last_name: Option<String>,
}

impl List {
    fn query(self) -> ListQuery {
        let filters = [
            ("id", self.id),
            ("email", self.email),
            ("last_name", self.last_name),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect::<BTreeMap<_, _>>();

        ListQuery {
            page: self.page,
            limit: self.limit,
            search: self.search,
            position: self.position,
            filters,
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf, json: bool) -> anyhow::Result<()> {
        let api = super::open(root)?;
        let response = api.list(&self.query());

        super::finish(response, json, |body| {
            let Some(Data::Records(records)) = &body.data else {
                return;
            };

            if records.is_empty() {
                println!("{}", "No staff members found".dim());
            }

            let width = records
                .iter()
                .map(|view| super::display_name(view).chars().count())
                .max()
                .unwrap_or(0);
            for view in records {
                println!(
                    "{:>5}  {:<width$}  {:<6}  {}",
                    format!("#{}", view.id).info(),
                    super::display_name(view),
                    format!("^{}", view.pid).dim(),
                    view.position.as_deref().unwrap_or_default(),
                );
            }

            if let Some(pagination) = &body.pagination {
                println!(
                    "{}",
                    format!(
                        "Page {} of {} ({} total)",
                        pagination.current_page,
                        pagination.total_pages.max(1),
                        pagination.total
                    )
                    .dim()
                );
            }
        })
    }
}
