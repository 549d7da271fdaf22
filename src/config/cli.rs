use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Scriptorium binary.
#[derive(Debug, Parser)]
#[command(name = "scriptorium", version, about = "Scriptorium blog engine")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SCRIPTORIUM_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the public site over HTTP.
    Serve(Box<ServeArgs>),
    /// Export entries and tags to a TOML archive.
    #[command(name = "export")]
    ExportSite(ExportArgs),
    /// Import entries and tags from a TOML archive.
    #[command(name = "import")]
    ImportSite(ImportArgs),
    /// Create an entry from a Markdown file.
    #[command(name = "new")]
    NewEntry(NewEntryArgs),
    /// Change an entry's title, superseding its slug when it changes.
    #[command(name = "retitle")]
    Retitle(RetitleArgs),
    /// Move an entry to the removed-entries table.
    #[command(name = "remove")]
    Remove(RemoveArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the public base URL used in feeds and canonical links.
    #[arg(long = "site-base-url", value_name = "URL")]
    pub site_base_url: Option<String>,

    /// Override the number of entries per home page.
    #[arg(long = "site-page-size", value_name = "COUNT")]
    pub site_page_size: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Path to the export file to write.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Path to the archive to import.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct NewEntryArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Entry title; the slug is derived from it.
    #[arg(long, value_name = "TITLE")]
    pub title: String,

    /// Markdown file holding the entry body.
    #[arg(long = "content-file", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub content_file: PathBuf,

    /// Tag marker such as `#rust`, `@notes` or `+advent`; repeatable.
    #[arg(long = "tag", value_name = "MARKER")]
    pub tags: Vec<String>,

    /// Optional social image path.
    #[arg(long, value_name = "PATH")]
    pub image: Option<String>,

    /// Post the entry immediately instead of leaving it as a draft.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub posted: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RetitleArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Numeric entry key.
    #[arg(value_name = "ID")]
    pub id: i64,

    /// New title.
    #[arg(value_name = "TITLE")]
    pub title: String,
}

#[derive(Debug, Args, Clone)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Numeric entry key.
    #[arg(value_name = "ID")]
    pub id: i64,
}

impl Command {
    /// Database override carried by the maintenance subcommands.
    pub(crate) fn database_override(&self) -> Option<&DatabaseOverride> {
        match self {
            Command::Serve(_) => None,
            Command::ExportSite(args) => Some(&args.database),
            Command::ImportSite(args) => Some(&args.database),
            Command::NewEntry(args) => Some(&args.database),
            Command::Retitle(args) => Some(&args.database),
            Command::Remove(args) => Some(&args.database),
        }
    }
}
