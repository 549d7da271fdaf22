//! Markdown rendering for entry bodies and tag descriptions.
//!
//! Comrak parses and renders, Ammonia sanitises the resulting HTML. Raw HTML
//! in the source is allowed through Comrak and cleaned afterwards.

use std::sync::Arc;

use comrak::nodes::{AstNode, NodeValue};
use comrak::options::Options;
use comrak::{Arena, format_html, parse_document};
use once_cell::sync::Lazy;
use thiserror::Error;

const ELLIPSIS: char = '…';

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
}

pub struct MarkdownRenderer {
    options: Options<'static>,
    sanitizer: ammonia::Builder<'static>,
}

static MARKDOWN_RENDERER: Lazy<Arc<MarkdownRenderer>> =
    Lazy::new(|| Arc::new(MarkdownRenderer::new()));

/// Shared renderer instance, built on first use.
pub fn markdown_renderer() -> Arc<MarkdownRenderer> {
    Arc::clone(&MARKDOWN_RENDERER)
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    pub fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        self.finish(root)
    }

    /// Render, dropping a level-one heading that opens the document. Used
    /// where the page template already prints its own heading.
    pub fn render_without_title(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        strip_leading_title(root);
        self.finish(root)
    }

    /// Plain text of the first paragraph, cut to `max_chars`.
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let paragraph = root.children().find(|node| {
            let data = node.data.borrow();
            matches!(data.value, NodeValue::Paragraph)
        });

        let text = paragraph.map(collect_text).unwrap_or_default();
        truncate_chars(text.trim(), max_chars)
    }

    fn finish<'a>(&self, root: &'a AstNode<'a>) -> Result<String, RenderError> {
        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;
        Ok(self.sanitizer.clean(&html).to_string())
    }
}

fn strip_leading_title<'a>(root: &'a AstNode<'a>) {
    let first_block = root.children().find(|node| {
        let data = node.data.borrow();
        !matches!(data.value, NodeValue::FrontMatter(_))
    });

    if let Some(node) = first_block
        && heading_level(node) == Some(1)
    {
        node.detach();
    }
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    let data = node.data.borrow();
    if let NodeValue::Heading(heading) = &data.value {
        Some(heading.level)
    } else {
        None
    }
}

fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for descendant in node.descendants() {
        let data = descendant.data.borrow();
        match &data.value {
            NodeValue::Text(literal) => text.push_str(literal),
            NodeValue::Code(code) => text.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    if let Some(boundary) = cut.rfind(' ') {
        cut.truncate(boundary);
    }
    cut.push(ELLIPSIS);
    cut
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some("---".to_string());

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = true;

    options
}

fn build_sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder.add_tags(&["input", "section"]);
    builder.add_generic_attributes(&["class", "id"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_tag_attributes("code", &["data-lang"]);
    builder.add_tag_attributes("pre", &["lang"]);
    builder.add_tag_attributes("th", &["align"]);
    builder.add_tag_attributes("td", &["align"]);
    builder.add_generic_attribute_prefixes(&["data-footnote"]);
    builder
}
