use std::{future::IntoFuture, process, sync::Arc};

use scriptorium::{
    application::{
        authoring::{AuthoringService, NewEntry, parse_tag_marker},
        error::AppError,
        repos::{
            EntriesRepo, EntriesWriteRepo, HealthCheck, SlugsRepo, TagsRepo, TagsWriteRepo,
        },
        site::SiteService,
        syndication::SyndicationService,
        tags::DescriptionSource,
        transfer::{self, SiteTransfer},
    },
    config,
    domain::types::EntryId,
    infra::{
        db::PostgresRepositories,
        descriptions::FsDescriptionSource,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::ExportSite(args) => run_export_site(settings, args).await,
        config::Command::ImportSite(args) => run_import_site(settings, args).await,
        config::Command::NewEntry(args) => run_new_entry(settings, args).await,
        config::Command::Retitle(args) => run_retitle(settings, args).await,
        config::Command::Remove(args) => run_remove(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let site = Arc::new(settings.site.clone());

    let entries: Arc<dyn EntriesRepo> = repositories.clone();
    let slugs: Arc<dyn SlugsRepo> = repositories.clone();
    let tags: Arc<dyn TagsRepo> = repositories.clone();
    let health: Arc<dyn HealthCheck> = repositories.clone();
    let descriptions: Arc<dyn DescriptionSource> =
        Arc::new(FsDescriptionSource::new(site.descriptions_dir.clone()));

    let state = HttpState {
        site: Arc::new(SiteService::new(
            entries.clone(),
            slugs.clone(),
            tags,
            descriptions,
            site.clone(),
        )),
        syndication: Arc::new(SyndicationService::new(entries, slugs, site)),
        health,
    };

    serve_http(&settings, state).await
}

async fn run_export_site(
    settings: config::Settings,
    args: config::ExportArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let path = args.file;

    info!(
        target = "scriptorium::export",
        path = %path.display(),
        "Starting export"
    );

    transfer::export_site(&build_transfer(&repositories, &settings), &path).await?;
    info!(target = "scriptorium::export", "Export completed");
    Ok(())
}

async fn run_import_site(
    settings: config::Settings,
    args: config::ImportArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let path = args.file;

    info!(
        target = "scriptorium::import",
        path = %path.display(),
        "Starting import"
    );

    let summary =
        transfer::import_site(&build_transfer(&repositories, &settings), &path).await?;
    info!(
        target = "scriptorium::import",
        entries = summary.entries_created,
        tags = summary.tags_created,
        "Import completed"
    );
    Ok(())
}

async fn run_new_entry(
    settings: config::Settings,
    args: config::NewEntryArgs,
) -> Result<(), AppError> {
    let content = tokio::fs::read_to_string(&args.content_file)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let tags = args
        .tags
        .iter()
        .map(|marker| parse_tag_marker(marker))
        .collect::<Result<Vec<_>, _>>()?;

    let repositories = init_repositories(&settings).await?;
    let authoring = build_authoring(&repositories, &settings);

    let entry = authoring
        .create_entry(NewEntry {
            title: args.title,
            content,
            image: args.image,
            posted_at: args.posted.then(OffsetDateTime::now_utc),
            tags,
            ..NewEntry::default()
        })
        .await?;

    info!(
        target = "scriptorium::authoring",
        entry_id = %entry.id,
        posted = entry.is_published(),
        "Entry created"
    );
    Ok(())
}

async fn run_retitle(settings: config::Settings, args: config::RetitleArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let authoring = build_authoring(&repositories, &settings);

    let slug = authoring
        .retitle_entry(EntryId(args.id), &args.title)
        .await?;
    info!(
        target = "scriptorium::authoring",
        entry_id = args.id,
        path = %slug.path(),
        "Entry retitled"
    );
    Ok(())
}

async fn run_remove(settings: config::Settings, args: config::RemoveArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let authoring = build_authoring(&repositories, &settings);

    let removed = authoring.remove_entry(EntryId(args.id)).await?;
    info!(
        target = "scriptorium::authoring",
        entry_id = removed.id,
        slugs = ?removed.slugs,
        "Entry removed"
    );
    Ok(())
}

fn build_authoring(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> AuthoringService {
    let entries: Arc<dyn EntriesRepo> = repositories.clone();
    let slugs: Arc<dyn SlugsRepo> = repositories.clone();
    let tags: Arc<dyn TagsRepo> = repositories.clone();
    let entry_writer: Arc<dyn EntriesWriteRepo> = repositories.clone();
    let tag_writer: Arc<dyn TagsWriteRepo> = repositories.clone();

    AuthoringService::new(
        entries,
        slugs,
        tags,
        entry_writer,
        tag_writer,
        settings.site.slug_token_bound,
    )
}

fn build_transfer(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> SiteTransfer {
    SiteTransfer::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        build_authoring(repositories, settings),
    )
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "scriptorium::http",
        addr = %settings.server.addr,
        "Listening"
    );

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = stopping.clone();
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    };
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(signal)
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "scriptorium::http",
                grace_secs = grace.as_secs(),
                "Connections still open after the shutdown grace period; exiting"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "scriptorium::http", "Shutdown requested");
}
