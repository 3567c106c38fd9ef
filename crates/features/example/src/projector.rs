use crate::directory::UserDirectory;
use crate::events::{ExampleRef, ExampleTopic};
use crate::mapper::ExampleMapper;
use crate::model::ExampleModel;
use crate::records::{EXAMPLE_VIEW, ExampleFields};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tally_cqrs::{Aggregate, Mapper};
use tally_database::Database;
use tally_domain::event::DomainEvent;
use tally_domain::record::WriteRecord;
use tally_event_bus::{EventBusError, EventHandler};
use tracing::{debug, instrument};

/// Keeps [`EXAMPLE_VIEW`] in step with the committed `example` table.
///
/// Every event reloads the committed row, so replays and out-of-order deliveries converge on the
/// latest state.
pub struct ExampleProjector {
    db: Database,
    directory: Arc<dyn UserDirectory>,
    mapper: ExampleMapper,
}

impl fmt::Debug for ExampleProjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExampleProjector").field("view", &EXAMPLE_VIEW).finish_non_exhaustive()
    }
}

fn handler_error(message: impl Into<std::borrow::Cow<'static, str>>, id: &str) -> EventBusError {
    EventBusError::Handler { message: message.into(), context: Some(id.to_owned().into()) }
}

impl ExampleProjector {
    #[must_use]
    pub fn new(db: Database, directory: Arc<dyn UserDirectory>) -> Self {
        Self { db, directory, mapper: ExampleMapper }
    }

    async fn refresh(&self, id: &str) -> Result<(), EventBusError> {
        let Some(row) = self.db.get(ExampleModel::TABLE, id) else {
            self.db.remove_view(EXAMPLE_VIEW, id);
            debug!(id, "Example gone, projection removed");
            return Ok(());
        };

        let WriteRecord { id: row_id, version, created_at, updated_at, fields } = row;
        let fields: ExampleFields = serde_json::from_value(fields)
            .map_err(|err| handler_error(format!("corrupt example row: {err}"), id))?;
        let record = WriteRecord { id: row_id, version, created_at, updated_at, fields };
        let model = self.mapper.to_model_from_write_record(record);

        let owner_name = self
            .directory
            .display_name(model.owner_id())
            .await
            .map_err(|err| handler_error(format!("user directory: {err}"), id))?
            .unwrap_or_else(|| model.owner_id().to_owned());

        let projection = self.mapper.to_projection(&model, &owner_name);
        let value = serde_json::to_value(&projection)
            .map_err(|err| handler_error(format!("projection encoding: {err}"), id))?;
        self.db.upsert_view(EXAMPLE_VIEW, id, value);
        debug!(id, version = model.meta().version, "Projection refreshed");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for ExampleProjector {
    fn name(&self) -> &str {
        "example-projector"
    }

    #[instrument(skip_all, fields(topic = %event.topic(), event_id = event.event_id()))]
    async fn handle(&self, event: &DomainEvent) -> Result<(), EventBusError> {
        let target: ExampleRef = serde_json::from_value(event.payload().clone())
            .map_err(|err| handler_error(format!("unexpected payload: {err}"), event.event_id()))?;

        if event.topic().as_str() == ExampleTopic::Deleted.as_str() {
            self.db.remove_view(EXAMPLE_VIEW, &target.example_id);
            return Ok(());
        }
        self.refresh(&target.example_id).await
    }
}
