use crate::models::Category;
use std::collections::HashSet;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryScope {
    Tasks,
    Weather,
    SearchHistory,
}

/// Query state shared between a page and the forms it opens. Owned by the
/// app and passed down explicitly.
#[derive(Debug, Default)]
pub struct QueryCache {
    categories: Vec<Category>,
    invalidated: HashSet<QueryScope>,
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache::default()
    }

    pub fn publish_categories(&mut self, categories: Vec<Category>) {
        debug!(count = categories.len(), "publishing categories");
        self.categories = categories;
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn invalidate(&mut self, scope: QueryScope) {
        debug!(?scope, "query invalidated");
        self.invalidated.insert(scope);
    }

    /// Returns true once per invalidation.
    pub fn take_invalidated(&mut self, scope: QueryScope) -> bool {
        self.invalidated.remove(&scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_is_consumed_once() {
        let mut cache = QueryCache::new();
        cache.invalidate(QueryScope::Tasks);
        assert!(!cache.take_invalidated(QueryScope::Weather));
        assert!(cache.take_invalidated(QueryScope::Tasks));
        assert!(!cache.take_invalidated(QueryScope::Tasks));
    }

    #[test]
    fn test_publish_replaces_categories() {
        let mut cache = QueryCache::new();
        cache.publish_categories(vec![Category::new(1, "Work")]);
        cache.publish_categories(vec![Category::new(2, "Home")]);
        assert_eq!(cache.categories(), &[Category::new(2, "Home")]);
    }
}
