//! Offset/limit windowing over filtered results.
//!
//! Pages are 1-based. `perPage=0` or `perPage=all` selects unlimited mode,
//! where the whole filtered set is one page and the reported page size is
//! the total count.

use serde::Serialize;

/// Page size used when the request does not give a usable one.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Requested page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerPage {
    /// At most this many records per page (never zero).
    Limited(u32),
    /// Everything in one page.
    All,
}

impl PerPage {
    /// Parses a `perPage` query value.
    ///
    /// Returns `None` for malformed input so callers fall back to the
    /// default.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        match value.parse::<i64>().ok()? {
            0 => Some(Self::All),
            n => Some(Self::Limited(u32::try_from(n.max(1)).unwrap_or(u32::MAX))),
        }
    }
}

impl Default for PerPage {
    fn default() -> Self {
        Self::Limited(DEFAULT_PER_PAGE)
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: PerPage,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, PerPage::default())
    }
}

impl PageRequest {
    /// Creates a request, clamping the page and a bounded page size to at
    /// least 1.
    #[must_use]
    pub fn new(page: u32, per_page: PerPage) -> Self {
        let per_page = match per_page {
            PerPage::Limited(n) => PerPage::Limited(n.max(1)),
            PerPage::All => PerPage::All,
        };
        Self {
            page: page.max(1),
            per_page,
        }
    }

    /// Requests the entire result set.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(1, PerPage::All)
    }

    /// Reads `page` and `perPage` from decoded query-string pairs; other
    /// keys are ignored and malformed values fall back to defaults.
    #[must_use]
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut page = None;
        let mut per_page = None;

        for (key, value) in pairs {
            match key {
                "page" if page.is_none() => {
                    page = value
                        .trim()
                        .parse::<i64>()
                        .ok()
                        .map(|p| u32::try_from(p.max(1)).unwrap_or(u32::MAX));
                }
                "perPage" if per_page.is_none() => per_page = PerPage::parse(value),
                _ => {}
            }
        }

        Self::new(page.unwrap_or(1), per_page.unwrap_or_default())
    }

    /// The requested page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// The requested page size.
    #[must_use]
    pub const fn per_page(&self) -> PerPage {
        self.per_page
    }

    /// Whether unlimited mode was requested.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        matches!(self.per_page, PerPage::All)
    }

    /// Number of records to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self.per_page {
            PerPage::All => 0,
            PerPage::Limited(n) => u64::from(self.page - 1) * u64::from(n),
        }
    }

    /// Maximum number of records to return, `None` in unlimited mode.
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        match self.per_page {
            PerPage::All => None,
            PerPage::Limited(n) => Some(u64::from(n)),
        }
    }

    /// Wraps an already-windowed slice with the reported metadata.
    #[must_use]
    pub fn finish<T>(&self, total: u64, items: Vec<T>) -> Page<T> {
        match self.per_page {
            PerPage::All => Page {
                total,
                page: 1,
                per_page: total,
                items,
            },
            PerPage::Limited(n) => Page {
                total,
                page: self.page,
                per_page: u64::from(n),
                items,
            },
        }
    }

    /// Windows a complete, ordered result set.
    #[must_use]
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let window: Vec<T> = match self.limit() {
            None => items,
            Some(limit) => items
                .into_iter()
                .skip(offset)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
        };
        self.finish(total, window)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Size of the full filtered set.
    pub total: u64,
    /// Reported page number.
    pub page: u32,
    /// Reported page size; equals `total` in unlimited mode.
    pub per_page: u64,
    /// Records on this page.
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Converts the records, keeping the metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn request(pairs: &[(&str, &str)]) -> PageRequest {
        PageRequest::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(request(&[]), PageRequest::new(1, PerPage::Limited(20)));
        assert_eq!(
            request(&[("page", "-4"), ("perPage", "-2")]),
            PageRequest::new(1, PerPage::Limited(1))
        );
        assert_eq!(
            request(&[("page", "two"), ("perPage", "many")]),
            PageRequest::new(1, PerPage::Limited(20))
        );
        assert_eq!(PageRequest::new(0, PerPage::Limited(0)).offset(), 0);
        assert_eq!(PageRequest::new(0, PerPage::Limited(0)).limit(), Some(1));
    }

    #[test]
    fn zero_and_all_select_unlimited_mode() {
        assert!(request(&[("perPage", "0")]).is_unlimited());
        assert!(request(&[("perPage", "ALL")]).is_unlimited());
        assert!(request(&[("perPage", "All"), ("page", "3")]).is_unlimited());
    }

    #[test]
    fn unlimited_returns_everything_and_reports_total() {
        let items: Vec<u32> = (0..37).collect();
        let page = request(&[("perPage", "0"), ("page", "4")]).paginate(items);
        assert_eq!(page.items.len(), 37);
        assert_eq!(page.total, 37);
        assert_eq!(page.per_page, 37);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn pages_partition_the_result_set() {
        for total in [0_u32, 1, 9, 10, 11, 25, 100] {
            for per_page in [1_u32, 3, 10, 20] {
                let items: Vec<u32> = (0..total).collect();
                let pages = total.div_ceil(per_page);
                let mut seen = BTreeSet::new();
                let mut count = 0;
                for p in 1..=pages {
                    let page =
                        PageRequest::new(p, PerPage::Limited(per_page)).paginate(items.clone());
                    assert_eq!(page.total, u64::from(total));
                    for item in page.items {
                        assert!(seen.insert(item), "{item} appeared twice");
                        count += 1;
                    }
                }
                assert_eq!(count, total, "total={total} per_page={per_page}");
            }
        }
    }

    #[test]
    fn second_page_of_twenty_five() {
        let items: Vec<u32> = (1..=25).collect();
        let page = request(&[("page", "2"), ("perPage", "10")]).paginate(items);
        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 10);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = PageRequest::new(5, PerPage::Limited(10)).paginate(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.page, 5);
    }
}
