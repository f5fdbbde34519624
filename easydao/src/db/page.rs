use std::fmt;

use serde::Serialize;

/// One page of records plus the totals it was cut from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<E> {
    pub records: Vec<E>,
    pub total: u64,
    pub page_number: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl<E> PageResult<E> {
    pub fn new(records: Vec<E>, total: u64, page_number: u64, page_size: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            records,
            total,
            page_number,
            page_size,
            total_pages,
        }
    }

    pub fn empty(total: u64, page_number: u64, page_size: u64) -> Self {
        Self::new(Vec::new(), total, page_number, page_size)
    }

    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages
    }

    pub fn is_first(&self) -> bool {
        self.page_number == 1
    }

    pub fn is_last(&self) -> bool {
        self.page_number == self.total_pages
    }
}

impl<E> fmt::Display for PageResult<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PageResult{{records={} items, total={}, pageNumber={}, pageSize={}, totalPages={}}}",
            self.records.len(),
            self.total,
            self.page_number,
            self.page_size,
            self.total_pages
        )
    }
}
