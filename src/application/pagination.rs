//! Offset pagination over the published entry listing.
//!
//! Page numbers are 1-based. The first page lives at `/`, later pages at
//! `/page/{n}`; any request outside `1..=max_page` is answered with a
//! redirect to the root instead of an error page.

use std::num::NonZeroU32;

use thiserror::Error;

pub const ROOT_PATH: &str = "/";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("page {requested} is outside 1..={max_page}")]
pub struct PageOutOfRange {
    pub requested: i64,
    pub max_page: u64,
}

/// Window into the published listing for one requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    pub page: u64,
    pub max_page: u64,
    pub offset: u64,
    pub limit: u32,
}

impl PagePlan {
    pub fn path(&self) -> String {
        page_path(self.page)
    }

    pub fn previous_link(&self) -> Option<String> {
        (self.page > 1).then(|| page_path(self.page - 1))
    }

    pub fn next_link(&self) -> Option<String> {
        (self.page < self.max_page).then(|| page_path(self.page + 1))
    }
}

/// `ceil(count / page_size)`; zero when there is nothing to list.
pub fn max_page(count: u64, page_size: NonZeroU32) -> u64 {
    count.div_ceil(u64::from(page_size.get()))
}

/// Plan the slice of the listing shown on `requested`.
pub fn plan_page(
    count: u64,
    page_size: NonZeroU32,
    requested: i64,
) -> Result<PagePlan, PageOutOfRange> {
    let max_page = max_page(count, page_size);
    let out_of_range = PageOutOfRange {
        requested,
        max_page,
    };

    let page = u64::try_from(requested).map_err(|_| out_of_range)?;
    if page < 1 || page > max_page {
        return Err(out_of_range);
    }

    let size = u64::from(page_size.get());
    let offset = (page - 1) * size;
    let remaining = count - offset;
    let limit = remaining.min(size) as u32;

    Ok(PagePlan {
        page,
        max_page,
        offset,
        limit,
    })
}

/// Parse the `{n}` segment of `/page/{n}`. Anything but a plain integer is rejected.
pub fn parse_page_number(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

pub fn page_path(page: u64) -> String {
    if page <= 1 {
        ROOT_PATH.to_string()
    } else {
        format!("/page/{page}")
    }
}
