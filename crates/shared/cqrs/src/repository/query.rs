use crate::{CqrsError, CqrsErrorExt};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tally_database::Database;
use tracing::instrument;

/// Predicate over read projections.
pub trait Filter<P>: Send + Sync {
    fn matches(&self, projection: &P) -> bool;
}

/// Matches every projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct All;

impl<P> Filter<P> for All {
    fn matches(&self, _projection: &P) -> bool {
        true
    }
}

impl<P, F> Filter<P> for F
where
    F: Fn(&P) -> bool + Send + Sync,
{
    fn matches(&self, projection: &P) -> bool {
        self(projection)
    }
}

/// Read-side access returning projections directly, without loading business models.
#[async_trait]
pub trait QueryRepository<P: Send + 'static>: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<P>, CqrsError>;

    /// One 1-indexed page of matching projections in id order.
    async fn list_by_filter(
        &self,
        filter: &dyn Filter<P>,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<P>, CqrsError>;

    async fn count_by_filter(&self, filter: &dyn Filter<P>) -> Result<usize, CqrsError>;
}

/// Rejects `page < 1` and `page_size < 1` before any query runs.
pub fn check_page(page: usize, page_size: usize) -> Result<(), CqrsError> {
    if page < 1 || page_size < 1 {
        return Err(CqrsError::Pagination {
            message: format!("page and page size must be at least 1, got page={page} page_size={page_size}")
                .into(),
            context: None,
        });
    }
    Ok(())
}

/// [`QueryRepository`] over a database read view.
#[derive(Debug)]
pub struct ViewQueryRepository<P> {
    db: Database,
    view: &'static str,
    _projection: PhantomData<fn() -> P>,
}

impl<P> Clone for ViewQueryRepository<P> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), view: self.view, _projection: PhantomData }
    }
}

impl<P: DeserializeOwned + Send + 'static> ViewQueryRepository<P> {
    #[must_use]
    pub const fn new(db: Database, view: &'static str) -> Self {
        Self { db, view, _projection: PhantomData }
    }

    fn decode(&self, value: serde_json::Value) -> Result<P, CqrsError> {
        serde_json::from_value(value).context(self.view)
    }

    fn matching(&self, filter: &dyn Filter<P>) -> Result<Vec<P>, CqrsError> {
        let mut out = Vec::new();
        for (_, value) in self.db.scan_view(self.view) {
            let projection = self.decode(value)?;
            if filter.matches(&projection) {
                out.push(projection);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl<P: DeserializeOwned + Send + 'static> QueryRepository<P> for ViewQueryRepository<P> {
    async fn find_by_id(&self, id: &str) -> Result<Option<P>, CqrsError> {
        self.db.view(self.view, id).map(|value| self.decode(value)).transpose()
    }

    #[instrument(skip(self, filter), fields(view = self.view))]
    async fn list_by_filter(
        &self,
        filter: &dyn Filter<P>,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<P>, CqrsError> {
        check_page(page, page_size)?;
        let skip = (page - 1).saturating_mul(page_size);
        Ok(self.matching(filter)?.into_iter().skip(skip).take(page_size).collect())
    }

    async fn count_by_filter(&self, filter: &dyn Filter<P>) -> Result<usize, CqrsError> {
        Ok(self.matching(filter)?.len())
    }
}
