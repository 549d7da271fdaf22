use std::fmt;

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::{error::HttpError, navigator::EntryLink};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Site-wide values every layout shows.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteChrome {
    pub title: String,
    pub author: String,
    pub tagline: String,
    pub copyright_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Website,
    Article,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentType::Website => "website",
            ContentType::Article => "article",
        })
    }
}

/// Extra markup emitted inside `<head>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadFragment {
    Link {
        rel: &'static str,
        href: String,
        mime: Option<&'static str>,
        title: Option<String>,
    },
    Meta {
        name: &'static str,
        content: String,
    },
}

impl HeadFragment {
    pub fn link(rel: &'static str, href: impl Into<String>) -> Self {
        HeadFragment::Link {
            rel,
            href: href.into(),
            mime: None,
            title: None,
        }
    }

    pub fn alternate(mime: &'static str, href: impl Into<String>, title: impl Into<String>) -> Self {
        HeadFragment::Link {
            rel: "alternate",
            href: href.into(),
            mime: Some(mime),
            title: Some(title.into()),
        }
    }

    pub fn meta(name: &'static str, content: impl Into<String>) -> Self {
        HeadFragment::Meta {
            name,
            content: content.into(),
        }
    }
}

impl fmt::Display for HeadFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadFragment::Link {
                rel,
                href,
                mime,
                title,
            } => {
                write!(f, "<link rel=\"{rel}\" href=\"{}\"", escape_attr(href))?;
                if let Some(mime) = mime {
                    write!(f, " type=\"{mime}\"")?;
                }
                if let Some(title) = title {
                    write!(f, " title=\"{}\"", escape_attr(title))?;
                }
                f.write_str(">")
            }
            HeadFragment::Meta { name, content } => write!(
                f,
                "<meta name=\"{name}\" content=\"{}\">",
                escape_attr(content)
            ),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Everything a layout needs for one response. Built once per request and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PageData<T> {
    pub chrome: SiteChrome,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub content_type: ContentType,
    pub url: String,
    pub css: Vec<String>,
    pub js: Vec<String>,
    pub head: Vec<HeadFragment>,
    pub content: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBadge {
    pub label: String,
    pub href: String,
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCard {
    pub title: String,
    pub url: String,
    pub posted_iso: String,
    pub posted_label: String,
    pub excerpt: String,
    pub tags: Vec<TagBadge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationView {
    pub page: u64,
    pub max_page: u64,
    pub previous: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeView {
    pub entries: Vec<EntryCard>,
    pub pagination: PaginationView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub title: String,
    pub body_html: String,
    pub posted_iso: Option<String>,
    pub posted_label: Option<String>,
    pub modified_label: Option<String>,
    pub image: Option<String>,
    pub tags: Vec<TagBadge>,
    pub previous: Option<EntryLink>,
    pub next: Option<EntryLink>,
    pub is_draft: bool,
    pub json_ld: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagView {
    pub kind_label: &'static str,
    pub label: String,
    pub description_html: Option<String>,
    pub entries: Vec<EntryCard>,
    pub unposted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveItem {
    pub title: String,
    pub url: String,
    pub day_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMonth {
    pub anchor: String,
    pub label: String,
    pub entries: Vec<ArchiveItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSummary {
    pub label: String,
    pub href: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGroup {
    pub kind_label: &'static str,
    pub tags: Vec<TagSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveView {
    pub total: usize,
    pub months: Vec<ArchiveMonth>,
    pub tag_groups: Vec<TagGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundView {
    pub message: &'static str,
    pub code: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageData<HomeView>,
}

#[derive(Template)]
#[template(path = "entry.html")]
pub struct EntryTemplate {
    pub page: PageData<EntryView>,
}

#[derive(Template)]
#[template(path = "tag.html")]
pub struct TagTemplate {
    pub page: PageData<TagView>,
}

#[derive(Template)]
#[template(path = "archive.html")]
pub struct ArchiveTemplate {
    pub page: PageData<ArchiveView>,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub page: PageData<NotFoundView>,
}
