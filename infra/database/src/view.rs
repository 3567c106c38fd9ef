use crate::Database;
use serde_json::Value;

/// Read views hold disposable projections. They are written by projectors after the fact,
/// never inside a transaction, and carry no version.
impl Database {
    pub fn upsert_view(&self, view: &str, id: &str, projection: Value) {
        self.views.write().entry(view.to_owned()).or_default().insert(id.to_owned(), projection);
    }

    /// Returns `true` if a projection was removed.
    pub fn remove_view(&self, view: &str, id: &str) -> bool {
        self.views.write().get_mut(view).is_some_and(|rows| rows.remove(id).is_some())
    }

    #[must_use]
    pub fn view(&self, view: &str, id: &str) -> Option<Value> {
        self.views.read().get(view).and_then(|rows| rows.get(id)).cloned()
    }

    /// All projections of a view, ordered by id.
    #[must_use]
    pub fn scan_view(&self, view: &str) -> Vec<(String, Value)> {
        let mut rows: Vec<_> = self
            .views
            .read()
            .get(view)
            .map(|rows| rows.iter().map(|(id, v)| (id.clone(), v.clone())).collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Drops every projection of a view so it can be rebuilt.
    pub fn clear_view(&self, view: &str) {
        self.views.write().remove(view);
    }
}
