//! Limit/offset pagination primitives shared by backend list endpoints.
//!
//! [`PageRequest`] validates the window a caller asked for and [`Page`] wraps
//! one window of results together with the total match count and an optional
//! link to the following window.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Page size used when the caller does not supply a limit.
pub const DEFAULT_LIMIT: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// Errors raised while validating a [`PageRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageRequestError {
    /// The requested limit is zero or above [`MAX_LIMIT`].
    #[error("limit must be between 1 and {max}, got {value}")]
    LimitOutOfRange {
        /// Limit supplied by the caller.
        value: u32,
        /// Largest accepted limit.
        max: u32,
    },
}

/// Validated limit/offset window.
///
/// # Examples
/// ```
/// use pagination::PageRequest;
///
/// let page = PageRequest::new(Some(10), Some(30)).expect("valid window");
/// assert_eq!(page.limit(), 10);
/// assert_eq!(page.next().offset(), 40);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    limit: u32,
    offset: u64,
}

impl PageRequest {
    /// Build a window, applying defaults for missing values.
    ///
    /// # Errors
    /// Returns [`PageRequestError::LimitOutOfRange`] when `limit` is zero or
    /// exceeds [`MAX_LIMIT`].
    pub fn new(limit: Option<u32>, offset: Option<u64>) -> Result<Self, PageRequestError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(PageRequestError::LimitOutOfRange {
                value: limit,
                max: MAX_LIMIT,
            });
        }
        Ok(Self {
            limit,
            offset: offset.unwrap_or(0),
        })
    }

    /// First window holding at most [`MAX_LIMIT`] items.
    #[must_use]
    pub const fn widest() -> Self {
        Self {
            limit: MAX_LIMIT,
            offset: 0,
        }
    }

    /// Maximum number of items in the window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items skipped before the window starts.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// The window immediately after this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit as u64),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// One window of results plus enough metadata to fetch the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    items: Vec<T>,
    total: u64,
    limit: u32,
    offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

impl<T> Page<T> {
    /// Wrap `items` fetched for `request` out of `total` matches.
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
            next: None,
        }
    }

    /// Items in this window.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consume the page, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Total number of matches across all windows.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Link to the following window, when one exists.
    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Whether matches remain beyond this window.
    #[must_use]
    pub fn has_more(&self) -> bool {
        let seen = u64::try_from(self.items.len()).unwrap_or(u64::MAX);
        self.offset.saturating_add(seen) < self.total
    }

    /// Attach a link to the following window derived from `base`.
    ///
    /// Existing query parameters other than `limit` and `offset` are kept.
    #[must_use]
    pub fn with_next_link(mut self, base: &Url) -> Self {
        if !self.has_more() {
            return self;
        }
        let next = PageRequest {
            limit: self.limit,
            offset: self.offset,
        }
        .next();
        let retained: Vec<(String, String)> = base
            .query_pairs()
            .filter(|(key, _)| key != "limit" && key != "offset")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let mut link = base.clone();
        link.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair("limit", &next.limit.to_string())
            .append_pair("offset", &next.offset.to_string());
        self.next = Some(link.to_string());
        self
    }

    /// Convert each item while preserving the window metadata.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
            next: self.next,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, DEFAULT_LIMIT, 0)]
    #[case(Some(1), Some(5), 1, 5)]
    #[case(Some(MAX_LIMIT), None, MAX_LIMIT, 0)]
    fn page_request_applies_defaults(
        #[case] limit: Option<u32>,
        #[case] offset: Option<u64>,
        #[case] expected_limit: u32,
        #[case] expected_offset: u64,
    ) {
        let page = PageRequest::new(limit, offset).expect("valid request");
        assert_eq!(page.limit(), expected_limit);
        assert_eq!(page.offset(), expected_offset);
    }

    #[rstest]
    #[case(0)]
    #[case(MAX_LIMIT + 1)]
    fn page_request_rejects_out_of_range_limits(#[case] limit: u32) {
        let err = PageRequest::new(Some(limit), None).expect_err("limit rejected");
        assert_eq!(
            err,
            PageRequestError::LimitOutOfRange {
                value: limit,
                max: MAX_LIMIT
            }
        );
    }

    #[rstest]
    fn next_link_keeps_filters_and_advances_offset() {
        let request = PageRequest::new(Some(2), Some(0)).expect("valid request");
        let base = Url::parse("http://localhost/api/v1/proposals?status=pending&limit=2")
            .expect("valid url");
        let page = Page::new(vec![1, 2], 5, request).with_next_link(&base);

        let link = Url::parse(page.next_link().expect("next link")).expect("valid link");
        let pairs: Vec<(String, String)> = link
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("status".to_owned(), "pending".to_owned()),
                ("limit".to_owned(), "2".to_owned()),
                ("offset".to_owned(), "2".to_owned()),
            ]
        );
    }

    #[rstest]
    fn last_page_has_no_next_link() {
        let request = PageRequest::new(Some(2), Some(4)).expect("valid request");
        let base = Url::parse("http://localhost/items").expect("valid url");
        let page = Page::new(vec![5], 5, request).with_next_link(&base);
        assert!(!page.has_more());
        assert!(page.next_link().is_none());
    }

    #[rstest]
    fn page_serialises_in_camel_case() {
        let page = Page::new(vec!["a"], 1, PageRequest::default()).map(str::to_uppercase);
        let value = serde_json::to_value(&page).expect("serialise page");
        assert_eq!(
            value,
            serde_json::json!({ "items": ["A"], "total": 1, "limit": 20, "offset": 0 })
        );
    }
}
