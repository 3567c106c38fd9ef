use crate::dto::{CreateExampleRequest, ExampleResponse, UpdateExampleRequest};
use crate::error::ExampleError;
use crate::model::ExampleModel;
use crate::records::{ExampleFields, ExampleProjection};
use chrono::Utc;
use tally_cqrs::{Aggregate, Mapper, ModelMeta};
use tally_domain::record::WriteRecord;

/// A create request together with the authenticated caller who will own the example.
#[derive(Debug, Clone)]
pub struct NewExample {
    pub owner_id: String,
    pub request: CreateExampleRequest,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleMapper;

#[must_use]
pub fn status_text(is_active: bool) -> &'static str {
    if is_active { "Active" } else { "Inactive" }
}

#[must_use]
pub fn display_name(name: &str, owner_name: &str) -> String {
    format!("{name} ({owner_name})")
}

impl ExampleMapper {
    /// Applies an update request through the model, so its invariants still hold.
    pub fn update_model_from_request(
        self,
        model: &mut ExampleModel,
        request: UpdateExampleRequest,
    ) -> Result<(), ExampleError> {
        model.update_details(request.name, request.description, Utc::now())
    }

    #[must_use]
    pub fn to_projection(self, model: &ExampleModel, owner_name: &str) -> ExampleProjection {
        let meta = model.meta();
        ExampleProjection {
            id: meta.id.clone(),
            name: model.name().to_owned(),
            description: model.description().to_owned(),
            owner_id: model.owner_id().to_owned(),
            owner_name: owner_name.to_owned(),
            is_active: model.is_active(),
            is_public: model.is_public(),
            display_name: display_name(model.name(), owner_name),
            status_text: status_text(model.is_active()).to_owned(),
            version: meta.version,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }
}

impl Mapper for ExampleMapper {
    type Request = NewExample;
    type Model = ExampleModel;
    type Fields = ExampleFields;
    type Projection = ExampleProjection;
    type Response = ExampleResponse;

    fn to_model_from_request(&self, new: NewExample) -> ExampleModel {
        let NewExample { owner_id, request } = new;
        ExampleModel::draft(
            ModelMeta::new(ExampleModel::TABLE, Utc::now()),
            request.name,
            request.description,
            owner_id,
            request.is_public,
        )
    }

    fn to_write_record(&self, model: &ExampleModel) -> WriteRecord<ExampleFields> {
        model.meta().record(ExampleFields {
            name: model.name().to_owned(),
            description: model.description().to_owned(),
            owner_id: model.owner_id().to_owned(),
            is_active: model.is_active(),
            is_public: model.is_public(),
        })
    }

    fn to_model_from_write_record(&self, record: WriteRecord<ExampleFields>) -> ExampleModel {
        let meta = ModelMeta::from_record(&record);
        let ExampleFields { name, description, owner_id, is_active, is_public } = record.fields;
        ExampleModel::hydrate(meta, name, description, owner_id, is_active, is_public)
    }

    fn to_response_from_projection(&self, projection: ExampleProjection) -> ExampleResponse {
        ExampleResponse {
            id: projection.id,
            name: projection.name,
            description: projection.description,
            owner_id: projection.owner_id,
            owner_name: Some(projection.owner_name),
            is_active: projection.is_active,
            is_public: projection.is_public,
            display_name: projection.display_name,
            status_text: projection.status_text,
            version: projection.version,
            created_at: projection.created_at,
            updated_at: projection.updated_at,
        }
    }

    fn to_response_from_model(&self, model: &ExampleModel) -> ExampleResponse {
        let meta = model.meta();
        ExampleResponse {
            id: meta.id.clone(),
            name: model.name().to_owned(),
            description: model.description().to_owned(),
            owner_id: model.owner_id().to_owned(),
            owner_name: None,
            is_active: model.is_active(),
            is_public: model.is_public(),
            display_name: model.name().to_owned(),
            status_text: status_text(model.is_active()).to_owned(),
            version: meta.version,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }
}
