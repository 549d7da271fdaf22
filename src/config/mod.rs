//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{
    CliArgs, Command, DatabaseOverride, ExportArgs, ImportArgs, NewEntryArgs, RemoveArgs,
    RetitleArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "scriptorium";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SITE_TITLE: &str = "Scriptorium";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_PAGE_SIZE: u32 = 5;
const DEFAULT_SLUG_TOKEN_BOUND: usize = 5;
const DEFAULT_FEED_SIZE: u32 = 20;
const DEFAULT_DESCRIPTIONS_DIR: &str = "descriptions";
const DEFAULT_STYLESHEET: &str = "/static/site.css";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Site identity and presentation knobs shared by every page.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSettings {
    pub title: String,
    pub author: String,
    pub description: String,
    /// Always ends in `/`.
    pub base_url: Url,
    pub page_size: NonZeroU32,
    pub slug_token_bound: NonZeroUsize,
    pub feed_size: NonZeroU32,
    pub descriptions_dir: PathBuf,
    pub default_image: Option<String>,
    pub stylesheets: Vec<String>,
    pub scripts: Vec<String>,
    pub entry_scripts: Vec<String>,
}

impl SiteSettings {
    /// Settings with every optional knob at its default.
    pub fn new(title: impl Into<String>, base_url: Url) -> Self {
        Self {
            title: title.into(),
            author: String::new(),
            description: String::new(),
            base_url: with_trailing_slash(base_url),
            page_size: NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
            slug_token_bound: NonZeroUsize::new(DEFAULT_SLUG_TOKEN_BOUND)
                .unwrap_or(NonZeroUsize::MIN),
            feed_size: NonZeroU32::new(DEFAULT_FEED_SIZE).unwrap_or(NonZeroU32::MIN),
            descriptions_dir: PathBuf::from(DEFAULT_DESCRIPTIONS_DIR),
            default_image: None,
            stylesheets: vec![DEFAULT_STYLESHEET.to_string()],
            scripts: Vec::new(),
            entry_scripts: Vec::new(),
        }
    }

    /// Absolute URL for a site-relative path.
    pub fn absolute_url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SCRIPTORIUM").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(other) => {
            if let Some(database) = other.database_override() {
                raw.apply_database_override(database);
            }
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(base_url) = overrides.site_base_url.as_ref() {
            self.site.base_url = Some(base_url.clone());
        }
        if let Some(size) = overrides.site_page_size {
            self.site.page_size = Some(size);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            site,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let site = build_site_settings(site)?;

        Ok(Self {
            server,
            logging,
            database,
            site,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let raw_base = site
        .base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = parse_base_url(raw_base.trim())
        .map_err(|reason| LoadError::invalid("site.base_url", reason))?;

    let title = site
        .title
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());
    if title.is_empty() {
        return Err(LoadError::invalid("site.title", "must not be empty"));
    }

    let page_size = non_zero_u32(
        site.page_size.unwrap_or(DEFAULT_PAGE_SIZE).into(),
        "site.page_size",
    )?;
    let feed_size = non_zero_u32(
        site.feed_size.unwrap_or(DEFAULT_FEED_SIZE).into(),
        "site.feed_size",
    )?;
    let slug_token_bound = NonZeroUsize::new(
        site.slug_token_bound
            .unwrap_or(DEFAULT_SLUG_TOKEN_BOUND),
    )
    .ok_or_else(|| LoadError::invalid("site.slug_token_bound", "must be greater than zero"))?;

    let descriptions_dir = site
        .descriptions_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DESCRIPTIONS_DIR));
    if descriptions_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "site.descriptions_dir",
            "path must not be empty",
        ));
    }

    let default_image = site.default_image.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(SiteSettings {
        title,
        author: site.author.unwrap_or_default(),
        description: site.description.unwrap_or_default(),
        base_url,
        page_size,
        slug_token_bound,
        feed_size,
        descriptions_dir,
        default_image,
        stylesheets: site
            .stylesheets
            .unwrap_or_else(|| vec![DEFAULT_STYLESHEET.to_string()]),
        scripts: site.scripts.unwrap_or_default(),
        entry_scripts: site.entry_scripts.unwrap_or_default(),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    base_url: Option<String>,
    page_size: Option<u32>,
    slug_token_bound: Option<usize>,
    feed_size: Option<u32>,
    descriptions_dir: Option<PathBuf>,
    default_image: Option<String>,
    stylesheets: Option<Vec<String>>,
    scripts: Option<Vec<String>>,
    entry_scripts: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_base_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value).map_err(|err| format!("invalid url `{value}`: {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(format!("`{value}` cannot serve as a base url"));
    }
    Ok(with_trailing_slash(url))
}

fn with_trailing_slash(mut url: Url) -> Url {
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
