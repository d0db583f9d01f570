use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

impl PageQuery {
    pub fn number(self) -> AppResult<u64> {
        match self.page {
            None => Ok(1),
            Some(0) => Err(AppError::validation("page", "page numbers start at 1")),
            Some(page) => Ok(page),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(count: u64, page: u64, page_size: u64, results: Vec<T>) -> Self {
        let next = (page.saturating_mul(page_size) < count).then(|| page + 1);
        let previous = (page > 1).then(|| page - 1);
        Self { count, next, previous, results }
    }

    pub fn empty() -> Self {
        Self { count: 0, next: None, previous: None, results: Vec::new() }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Rows skipped before `page`; `None` when the offset does not fit in a `u64`.
fn page_offset(page: u64, page_size: u64) -> Option<u64> {
    (page - 1).checked_mul(page_size)
}

/// Runs `select` for one page. Pages past the end are `NotFound`, except the
/// first page of an empty listing.
pub async fn fetch_page<E>(
    select: Select<E>,
    db: &DatabaseConnection,
    query: PageQuery,
    page_size: u64,
) -> AppResult<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
{
    let page = query.number()?;
    let paginator = select.paginate(db, page_size);
    let count = paginator.num_items().await?;
    if page > 1 && page_offset(page, page_size).is_none_or(|offset| offset >= count) {
        return Err(AppError::NotFound("page"));
    }
    let results = paginator.fetch_page(page - 1).await?;
    Ok(Page::new(count, page, page_size, results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_links() {
        let first: Page<u8> = Page::new(25, 1, 10, vec![]);
        assert_eq!((first.next, first.previous), (Some(2), None));

        let middle: Page<u8> = Page::new(25, 2, 10, vec![]);
        assert_eq!((middle.next, middle.previous), (Some(3), Some(1)));

        let last: Page<u8> = Page::new(25, 3, 10, vec![]);
        assert_eq!((last.next, last.previous), (None, Some(2)));

        let exact: Page<u8> = Page::new(20, 2, 10, vec![]);
        assert_eq!(exact.next, None);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        assert_eq!(page_offset(u64::MAX, 10), None);
        assert_eq!(page_offset(3, 10), Some(20));

        let page: Page<u8> = Page::new(25, u64::MAX, 10, vec![]);
        assert_eq!((page.next, page.previous), (None, Some(u64::MAX - 1)));
    }

    #[test]
    fn page_zero_rejected() {
        assert_eq!(PageQuery { page: None }.number().unwrap(), 1);
        assert!(PageQuery { page: Some(0) }.number().is_err());
    }
}
