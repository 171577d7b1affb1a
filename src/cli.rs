use std::path::PathBuf;

mod create;
mod delete;
mod init;
mod list;
mod show;
mod terminal;
mod update;
mod validate;

use clap::ArgAction;
use create::Create;
use delete::Delete;
use init::Init;
use list::List;
use show::Show;
use staffdir::{Api, Directory, Envelope, Response, StaffFields, StaffService, api::StaffView};
use update::Update;
use validate::Validate;

use self::terminal::Colorize;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the staff directory
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Print the raw JSON response instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command.run(self.root, self.json)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Initialize a new staff directory
    Init(Init),

    /// List staff members
    ///
    /// A name search takes precedence over a position lookup, which takes
    /// precedence over the field filters.
    List(List),

    /// Show a single staff member
    Show(Show),

    /// Add a staff member
    Create(Create),

    /// Change some fields of a staff member
    Update(Update),

    /// Remove a staff member who has no subordinates
    Delete(Delete),

    /// Check staff fields without storing anything
    Validate(Validate),
}

impl Command {
    fn run(self, root: PathBuf, json: bool) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(root)?,
            Self::List(command) => command.run(root, json)?,
            Self::Show(command) => command.run(root, json)?,
            Self::Create(command) => command.run(root, json)?,
            Self::Update(command) => command.run(root, json)?,
            Self::Delete(command) => command.run(root, json)?,
            Self::Validate(command) => command.run(root, json)?,
        }
        Ok(())
    }
}

/// The editable fields of a staff member, shared by several subcommands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FieldArgs {
    /// ID of the manager, or 0 for the chief
    #[arg(long, allow_hyphen_values = true)]
    pid: Option<i64>,

    /// Given name
    #[arg(long)]
    first_name: Option<String>,

    /// Family name
    #[arg(long)]
    last_name: Option<String>,

    /// Job title
    #[arg(long)]
    position: Option<String>,

    /// Contact email
    #[arg(long)]
    email: Option<String>,

    /// Home phone number
    #[arg(long)]
    home_phone: Option<String>,

    /// Free-form notes
    #[arg(long)]
    notes: Option<String>,
}

impl FieldArgs {
    /// The request body carrying the supplied fields.
    fn body(self) -> anyhow::Result<String> {
        let fields = StaffFields {
            pid: self.pid.map(Some),
            first_name: self.first_name,
            last_name: self.last_name,
            position: self.position,
            email: self.email,
            home_phone: self.home_phone,
            notes: self.notes,
        };
        if fields.is_empty() {
            anyhow::bail!("No fields given (see --help for the available flags)");
        }
        Ok(serde_json::to_string(&fields)?)
    }
}

/// Open the directory at `root` behind the API surface.
fn open(root: PathBuf) -> anyhow::Result<Api<Directory>> {
    let directory = Directory::open(root)?;
    let page_size = directory.config().default_page_size();
    Ok(Api::new(StaffService::with_page_size(directory, page_size)))
}

/// Print a response and turn failures into errors.
///
/// `render` prints the human-readable form of a successful response.
fn finish(response: Response, json: bool, render: impl FnOnce(&Envelope)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response.body)?);
    } else if response.is_success() {
        render(&response.body);
    }

    if response.is_success() {
        return Ok(());
    }

    if !json {
        if let Some(errors) = &response.body.errors {
            for (field, message) in errors.iter() {
                eprintln!("  • {}: {message}", field.to_string().warning());
            }
        }
    }
    let message = response.body.message.unwrap_or_default();
    anyhow::bail!("{message} (status {})", response.status)
}

/// Print the fields of a single record.
fn print_record(view: &StaffView) {
    let name = display_name(view);
    println!("{}", format!("#{} {name}", view.id).info());
    print_field("Manager", &manager_label(view.pid));
    print_optional("Position", view.position.as_deref());
    print_optional("Email", view.email.as_deref());
    print_optional("Home phone", view.home_phone.as_deref());
    print_optional("Notes", view.notes.as_deref());
    print_field("Created", &view.created_at);
    print_field("Updated", &view.updated_at);
}

fn print_field(label: &str, value: &str) {
    println!("  {:<11} {value}", format!("{label}:").dim());
}

fn print_optional(label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        print_field(label, value);
    }
}

fn manager_label(pid: u64) -> String {
    if pid == 0 {
        "none (chief)".to_string()
    } else {
        format!("#{pid}")
    }
}

/// First and last name, falling back to the ID.
fn display_name(view: &StaffView) -> String {
    let name = [view.first_name.as_deref(), view.last_name.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        format!("#{}", view.id)
    } else {
        name
    }
}
