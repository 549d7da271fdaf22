//! Utilities for generating deterministic, human-friendly slugs.
//!
//! ASCII slugification (`slug` crate) is combined with Chinese
//! transliteration (`pinyin` crate) so inputs like “基线对齐” become
//! `ji-xian-dui-qi`. Uniqueness is delegated to a caller-supplied predicate,
//! keeping generation itself pure.

use std::future::Future;
use std::num::NonZeroUsize;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 256;
const SEPARATOR: char = '-';

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Errors that can occur while generating a slug via an async uniqueness check.
#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Normalize arbitrary text into slug form without truncation.
///
/// Lower-cases, maps every run of non-alphanumeric characters to a single
/// `-`, and trims separators at both ends. Used for lookups, where stored
/// slugs may carry a numeric suffix beyond the generation bound.
pub fn normalize_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Derive a base slug from a title: the normalized form cut to its first
/// `token_bound` dash-separated tokens.
pub fn derive_slug(input: &str, token_bound: NonZeroUsize) -> Result<String, SlugError> {
    let normalized = normalize_slug(input)?;
    let tokens: Vec<&str> = normalized
        .split(SEPARATOR)
        .take(token_bound.get())
        .collect();
    Ok(tokens.join("-"))
}

/// Produce a slug that does not collide according to the supplied predicate.
///
/// `is_unique` must return `true` when the candidate is free. Collisions are
/// resolved with the smallest unused positive suffix (`-1`, `-2`, …).
pub fn generate_unique_slug<F>(
    input: &str,
    token_bound: NonZeroUsize,
    mut is_unique: F,
) -> Result<String, SlugError>
where
    F: FnMut(&str) -> bool,
{
    let base = derive_slug(input, token_bound)?;

    if is_unique(&base) {
        return Ok(base);
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = suffixed(&base, attempt);
        if is_unique(&candidate) {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted { base })
}

/// Async variant of [`generate_unique_slug`] that awaits the uniqueness predicate.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    token_bound: NonZeroUsize,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input, token_bound)?;

    if is_unique(base.clone())
        .await
        .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(base);
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = suffixed(&base, attempt);
        if is_unique(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

fn suffixed(base: &str, attempt: usize) -> String {
    format!("{base}{SEPARATOR}{attempt}")
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            // Left for slugify to fold or drop.
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
    buffer.push(' ');
}
