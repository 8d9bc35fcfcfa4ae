use super::{NapDataStore, StoreError};
use crate::{
    http::Transport,
    types::{ListOptions, SortOption},
};
use serde_json::Value;

/// Grid-side view over a [`NapDataStore`]: one page of records at a time.
///
/// Without a page size the whole (filtered) resource is loaded at once.
///
/// The total comes from the server's `totalCount`. A backend that pages without reporting
/// one leaves the total unknown until a short page shows where the records end; until
/// then a full page means there may be another one.
#[derive(Debug)]
pub struct DataSource<T> {
    store: NapDataStore<T>,
    page_size: Option<u64>,
    page_index: u64,
    sort: Vec<SortOption>,
    items: Vec<Value>,
    loaded: bool,
    total_count: Option<u64>,
}

impl<T> DataSource<T> {
    pub fn new(store: NapDataStore<T>) -> Self {
        Self {
            store,
            page_size: None,
            page_index: 0,
            sort: Vec::new(),
            items: Vec::new(),
            loaded: false,
            total_count: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size).filter(|n| *n > 0);
        self
    }

    pub fn sort_by(mut self, sort: SortOption) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn store(&self) -> &NapDataStore<T> {
        &self.store
    }

    pub fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    pub fn set_page_index(&mut self, page_index: u64) {
        self.page_index = page_index;
    }

    /// Records of the last loaded page.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Total number of records, when known.
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Number of pages, when the total is known.
    pub fn page_count(&self) -> Option<u64> {
        let total = self.total_count?;
        match self.page_size {
            Some(size) => Some(total.div_ceil(size)),
            None => Some(u64::from(total > 0)),
        }
    }

    /// Whether a page after the current one may exist. `false` until the first load.
    pub fn has_next_page(&self) -> bool {
        if !self.loaded {
            return false;
        }
        match (self.page_count(), self.page_size) {
            (Some(count), _) => self.page_index.saturating_add(1) < count,
            (None, Some(size)) => self.items.len() as u64 >= size,
            (None, None) => false,
        }
    }

    fn load_options(&self) -> ListOptions {
        ListOptions {
            skip: self
                .page_size
                .map(|size| size.saturating_mul(self.page_index)),
            take: self.page_size,
            sort: (!self.sort.is_empty()).then(|| self.sort.clone()),
            ..Default::default()
        }
    }
}

impl<T: Transport> DataSource<T> {
    /// Loads the current page.
    pub async fn load(&mut self) -> Result<&[Value], StoreError> {
        let result = self.store.load(Some(self.load_options())).await?;
        let loaded = result.data.len() as u64;
        self.total_count = match self.page_size {
            _ if result.total_reported => Some(result.total_count),
            None => Some(loaded),
            // A short page is the last one.
            Some(size) if loaded < size => {
                Some(size.saturating_mul(self.page_index).saturating_add(loaded))
            }
            Some(_) => None,
        };
        self.items = result.data;
        self.loaded = true;
        Ok(&self.items)
    }

    /// Same as [`Self::load`]; reads better after the store filter changed.
    pub async fn reload(&mut self) -> Result<&[Value], StoreError> {
        self.load().await
    }

    /// Moves to the next page and loads it, if there is one.
    pub async fn next_page(&mut self) -> Result<Option<&[Value]>, StoreError> {
        if !self.has_next_page() {
            return Ok(None);
        }
        self.page_index = self.page_index.saturating_add(1);
        self.load().await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NapConnection;

    fn source() -> DataSource<()> {
        DataSource::new(NapDataStore::new("users", NapConnection::with_transport(())))
    }

    #[test]
    fn paging_options_follow_page_index() {
        let mut source = source()
            .with_page_size(20)
            .sort_by(SortOption::desc("createdAt"));
        source.set_page_index(2);

        let options = source.load_options();
        assert_eq!(options.skip, Some(40));
        assert_eq!(options.take, Some(20));
        assert_eq!(options.sort, Some(vec![SortOption::desc("createdAt")]));
    }

    #[test]
    fn unpaged_source_loads_everything() {
        let options = source().load_options();
        assert_eq!(options, ListOptions::default());
    }

    #[test]
    fn page_count_rounds_up() {
        let mut source = source().with_page_size(10);
        assert_eq!(source.page_count(), None);
        assert!(!source.has_next_page());

        source.loaded = true;
        source.total_count = Some(25);
        assert_eq!(source.page_count(), Some(3));
        assert!(source.has_next_page());

        source.set_page_index(2);
        assert!(!source.has_next_page());
    }

    #[test]
    fn full_page_without_total_may_have_a_next_page() {
        let mut source = source().with_page_size(2);
        source.loaded = true;
        source.items = vec![Value::Null, Value::Null];
        assert_eq!(source.page_count(), None);
        assert!(source.has_next_page());

        source.items.pop();
        assert!(!source.has_next_page());
    }

    #[test]
    fn huge_page_index_saturates() {
        let mut source = source().with_page_size(20);
        source.set_page_index(u64::MAX);
        assert_eq!(source.load_options().skip, Some(u64::MAX));

        source.loaded = true;
        source.total_count = Some(40);
        assert!(!source.has_next_page());
    }

    #[test]
    fn zero_page_size_means_unpaged() {
        let source = source().with_page_size(0);
        assert_eq!(source.page_size(), None);
    }
}
