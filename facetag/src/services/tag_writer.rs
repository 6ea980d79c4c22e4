//! Tag write-back
//!
//! Names are stored on each image as a property group of the `tags`
//! template, one positional field per person (`person0`..`person4`).
//! Writes are upserts: create, and overwrite if the store reports that a
//! group for this template is already attached.

use crate::db::CheckpointStore;
use crate::store::{RemoteStore, StoreError};
use crate::types::{PropertyField, TemplateField, TemplateId, TemplateSpec};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

pub const TEMPLATE_NAME: &str = "tags";
pub const TEMPLATE_DESCRIPTION: &str = "Picture tags";

/// Number of positional person fields in the template
pub const MAX_TAG_FIELDS: usize = 5;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Creating metadata template failed: {0}")]
    Template(#[source] StoreError),

    #[error("Caching template id failed: {0}")]
    TemplateCache(#[source] facetag_common::Error),

    #[error("Writing tags to {path} failed: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },
}

/// How an upsert landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Overwritten,
}

/// Name of the positional field at `index`
pub fn field_name(index: usize) -> String {
    format!("person{}", index)
}

/// All person field names, in position order
pub fn field_names() -> Vec<String> {
    (0..MAX_TAG_FIELDS).map(field_name).collect()
}

/// Template definition for tag properties
pub fn tags_template() -> TemplateSpec {
    TemplateSpec {
        name: TEMPLATE_NAME.to_string(),
        description: TEMPLATE_DESCRIPTION.to_string(),
        fields: (0..MAX_TAG_FIELDS)
            .map(|i| TemplateField {
                name: field_name(i),
                description: format!("Person {}", i),
            })
            .collect(),
    }
}

/// Positional fields for `names`, truncated to the template's field count
pub fn build_fields(names: &[String]) -> Vec<PropertyField> {
    names
        .iter()
        .take(MAX_TAG_FIELDS)
        .enumerate()
        .map(|(i, name)| PropertyField {
            name: field_name(i),
            value: name.clone(),
        })
        .collect()
}

pub struct TagWriter {
    store: Arc<dyn RemoteStore>,
    checkpoints: CheckpointStore,
    template_id: OnceCell<TemplateId>,
}

impl TagWriter {
    pub fn new(store: Arc<dyn RemoteStore>, checkpoints: CheckpointStore) -> Self {
        Self {
            store,
            checkpoints,
            template_id: OnceCell::new(),
        }
    }

    /// Template id, created on the store and cached on first use
    pub async fn template_id(&self) -> Result<TemplateId, WriteError> {
        self.template_id
            .get_or_try_init(|| async {
                if let Some(id) = self
                    .checkpoints
                    .template_id()
                    .await
                    .map_err(WriteError::TemplateCache)?
                {
                    return Ok(id);
                }

                let id = self
                    .store
                    .add_template(&tags_template())
                    .await
                    .map_err(WriteError::Template)?;
                self.checkpoints
                    .set_template_id(&id)
                    .await
                    .map_err(WriteError::TemplateCache)?;

                tracing::info!(template_id = %id, "Created tags template");
                Ok::<_, WriteError>(id)
            })
            .await
            .cloned()
    }

    /// Upsert the tag property group of one image
    pub async fn write_tags(&self, path: &str, names: &[String]) -> Result<WriteOutcome, WriteError> {
        if names.len() > MAX_TAG_FIELDS {
            tracing::warn!(
                path = %path,
                names = names.len(),
                kept = MAX_TAG_FIELDS,
                "More names than tag fields, extra names dropped"
            );
        }

        let template_id = self.template_id().await?;
        let fields = build_fields(names);

        match self.store.add_properties(path, &template_id, &fields).await {
            Ok(()) => Ok(WriteOutcome::Created),
            Err(StoreError::PropertyGroupAlreadyExists) => {
                self.store
                    .overwrite_properties(path, &template_id, &fields)
                    .await
                    .map_err(|source| WriteError::Store {
                        path: path.to_string(),
                        source,
                    })?;
                Ok(WriteOutcome::Overwritten)
            }
            Err(source) => Err(WriteError::Store {
                path: path.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fields_positional() {
        let fields = build_fields(&["drew".to_string(), "arash".to_string()]);
        assert_eq!(
            fields,
            vec![
                PropertyField {
                    name: "person0".into(),
                    value: "drew".into()
                },
                PropertyField {
                    name: "person1".into(),
                    value: "arash".into()
                },
            ]
        );
    }

    #[test]
    fn test_build_fields_truncates_to_template() {
        let names: Vec<String> = (0..7).map(|i| format!("n{}", i)).collect();
        let fields = build_fields(&names);
        assert_eq!(fields.len(), MAX_TAG_FIELDS);
        assert_eq!(fields[4].name, "person4");
        assert_eq!(fields[4].value, "n4");
    }

    #[test]
    fn test_tags_template_shape() {
        let template = tags_template();
        assert_eq!(template.name, "tags");
        assert_eq!(template.description, "Picture tags");
        let names: Vec<_> = template.fields.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, field_names());
    }
}
