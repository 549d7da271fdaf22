use std::{sync::Arc, time::Instant};

use askama::Template;
use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::debug;

use crate::{
    application::{
        error::{HttpError, NotFoundReason, SiteError},
        repos::HealthCheck,
        resolver::Resolution,
        site::SiteService,
        syndication::SyndicationService,
    },
    domain::types::{EntryId, TagKind},
    infra::telemetry::{METRIC_PAGE_RENDER_MS, METRIC_REDIRECT_TOTAL},
    presentation::views::{
        ArchiveTemplate, EntryTemplate, HomeTemplate, NotFoundTemplate, TagTemplate,
        render_template_response,
    },
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

const STYLESHEET: &str = include_str!("../../../static/site.css");

#[derive(Clone)]
pub struct HttpState {
    pub site: Arc<SiteService>,
    pub syndication: Arc<SyndicationService>,
    pub health: Arc<dyn HealthCheck>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/page/{page}", get(paged_index))
        .route("/entry/{slug}", get(entry_detail))
        .route("/entry/id/{id}", get(entry_by_id))
        .route("/tags/{slug}", get(general_tag))
        .route("/categories/{slug}", get(category_tag))
        .route("/series/{slug}", get(series_tag))
        .route("/archive", get(archive))
        .route("/rss.xml", get(rss_feed))
        .route("/atom.xml", get(atom_feed))
        .route("/not-found", get(not_found))
        .route("/_health/db", get(public_health))
        .route("/static/site.css", get(stylesheet))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NotFoundQuery {
    err: Option<String>,
}

async fn index(State(state): State<HttpState>) -> Response {
    home_response(&state, None).await
}

async fn paged_index(State(state): State<HttpState>, Path(page): Path<String>) -> Response {
    home_response(&state, Some(&page)).await
}

async fn home_response(state: &HttpState, page: Option<&str>) -> Response {
    let started = Instant::now();
    match state.site.home(page).await {
        Ok(Resolution::Render(page)) => {
            render_page(HomeTemplate { page }, StatusCode::OK, "home", started)
        }
        Ok(Resolution::Redirect(location)) => see_other("home", &location),
        Err(err) => site_error_response("infra::http::public::home", err),
    }
}

async fn entry_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let started = Instant::now();
    match state.site.entry_by_slug(&slug).await {
        Ok(Resolution::Render(page)) => {
            render_page(EntryTemplate { page }, StatusCode::OK, "entry", started)
        }
        Ok(Resolution::Redirect(location)) => moved_permanently("entry", &location),
        Err(err) => site_error_response("infra::http::public::entry", err),
    }
}

async fn entry_by_id(State(state): State<HttpState>, Path(raw): Path<String>) -> Response {
    let Ok(id) = raw.parse::<i64>() else {
        debug!(
            target = "scriptorium::http::public",
            raw = %raw,
            "entry id is not a number"
        );
        return not_found_redirect(NotFoundReason::EntryIdNotFound);
    };

    match state.site.entry_by_id(EntryId(id)).await {
        Ok(location) => moved_permanently("entry_id", &location),
        Err(err) => site_error_response("infra::http::public::entry_by_id", err),
    }
}

async fn general_tag(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    tag_response(&state, TagKind::General, &slug).await
}

async fn category_tag(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    tag_response(&state, TagKind::Category, &slug).await
}

async fn series_tag(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    tag_response(&state, TagKind::Series, &slug).await
}

async fn tag_response(state: &HttpState, kind: TagKind, slug: &str) -> Response {
    let started = Instant::now();
    match state.site.tag(kind, slug).await {
        Ok(Resolution::Render(page)) => {
            render_page(TagTemplate { page }, StatusCode::OK, "tag", started)
        }
        Ok(Resolution::Redirect(location)) => moved_permanently("tag", &location),
        Err(err) => site_error_response("infra::http::public::tag", err),
    }
}

async fn archive(State(state): State<HttpState>) -> Response {
    let started = Instant::now();
    match state.site.archive().await {
        Ok(page) => render_page(ArchiveTemplate { page }, StatusCode::OK, "archive", started),
        Err(err) => site_error_response("infra::http::public::archive", err),
    }
}

async fn not_found(State(state): State<HttpState>, Query(query): Query<NotFoundQuery>) -> Response {
    let page = state.site.not_found(query.err.as_deref());
    render_template_response(NotFoundTemplate { page }, StatusCode::NOT_FOUND)
}

async fn fallback(State(state): State<HttpState>) -> Response {
    let page = state.site.not_found(None);
    render_template_response(NotFoundTemplate { page }, StatusCode::NOT_FOUND)
}

async fn rss_feed(State(state): State<HttpState>) -> Response {
    match state.syndication.rss_feed().await {
        Ok(body) => xml_response(body, "application/rss+xml"),
        Err(err) => HttpError::from_error(
            "infra::http::public::rss",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate RSS feed",
            &err,
        )
        .into_response(),
    }
}

async fn atom_feed(State(state): State<HttpState>) -> Response {
    match state.syndication.atom_feed().await {
        Ok(body) => xml_response(body, "application/atom+xml"),
        Err(err) => HttpError::from_error(
            "infra::http::public::atom",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate Atom feed",
            &err,
        )
        .into_response(),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.check().await)
}

async fn stylesheet() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/css; charset=utf-8")
        .header(CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from(STYLESHEET))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn render_page<T: Template>(
    template: T,
    status: StatusCode,
    page: &'static str,
    started: Instant,
) -> Response {
    let response = render_template_response(template, status);
    histogram!(METRIC_PAGE_RENDER_MS, "page" => page)
        .record(started.elapsed().as_secs_f64() * 1000.0);
    response
}

/// Not-found conditions become a redirect to the not-found page; anything
/// else is a server-side failure.
fn site_error_response(source: &'static str, err: SiteError) -> Response {
    match err {
        SiteError::NotFound(reason) => not_found_redirect(reason),
        SiteError::Repo(err) => repo_error_to_http(source, err).into_response(),
        SiteError::Render(err) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to render content",
            &err,
        )
        .into_response(),
        SiteError::Description(err) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load tag description",
            &err,
        )
        .into_response(),
    }
}

fn not_found_redirect(reason: NotFoundReason) -> Response {
    see_other("not_found", &reason.redirect_path())
}

fn see_other(route: &'static str, location: &str) -> Response {
    counter!(METRIC_REDIRECT_TOTAL, "route" => route).increment(1);
    Redirect::to(location).into_response()
}

fn moved_permanently(route: &'static str, location: &str) -> Response {
    counter!(METRIC_REDIRECT_TOTAL, "route" => route).increment(1);
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn xml_response(body: String, content_type: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
