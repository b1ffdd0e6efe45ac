//! Pagination types for list endpoints

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Pagination parameters (from query string)
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Items per page
    #[serde(default = "default_size")]
    pub size: i64,

    #[serde(default = "default_sort_by")]
    pub sort_by: String,

    #[serde(default)]
    pub sort_order: SortDirection,
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

fn default_sort_by() -> String {
    "created_at".to_string()
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
            sort_by: default_sort_by(),
            sort_order: SortDirection::default(),
        }
    }
}

impl PageParams {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page,
            size,
            ..Default::default()
        }
        .normalized()
    }

    /// Clamp page and size into their valid ranges
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.size = self.size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Calculate the SQL offset, saturating for absurdly large pages
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }

    /// Calculate the SQL limit
    pub fn limit(&self) -> i64 {
        self.size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// One page of a larger result set
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        let page = params.page.max(1);
        let size = params.limit();
        let pages = if total <= 0 { 0 } else { (total + size - 1) / size };
        Self {
            items,
            total,
            page,
            size,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }

    pub fn empty(params: &PageParams) -> Self {
        Self::new(Vec::new(), 0, params)
    }

    /// Convert the items while keeping the page metadata
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
            pages: self.pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}
