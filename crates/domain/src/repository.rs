//! Typed access to one collection.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{Document, DocumentQuery, DocumentStore, DocumentStoreError, DocumentStoreExt};
use serde_json::Value;

use crate::entity::{Entity, Patch};
use crate::error::{DomainError, Result};

/// Decodes a stored document into an entity, taking the id from the key.
pub fn decode_entity<T: Entity>(document: Document) -> Result<T> {
    let Document { key, mut data, .. } = document;
    if let Value::Object(fields) = &mut data {
        fields.insert("id".to_string(), Value::String(key.id.to_string()));
    }
    Ok(serde_json::from_value(data)?)
}

/// Repository over the collection of one entity type.
///
/// Every write returns the entity as stored, so callers never reload a
/// whole collection to observe their own change.
pub struct Repository<S, T>
where
    S: DocumentStore,
    T: Entity,
{
    store: S,
    _phantom: PhantomData<T>,
}

impl<S, T> Repository<S, T>
where
    S: DocumentStore,
    T: Entity,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an entity, returning None if it doesn't exist.
    pub async fn get(&self, id: &DocumentId) -> Result<Option<T>> {
        match self.store.get(&T::key_for(id)).await? {
            Some(document) => decode_entity(document).map(Some),
            None => Ok(None),
        }
    }

    /// Loads an entity that must exist.
    pub async fn require(&self, id: &DocumentId) -> Result<T> {
        self.get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(T::KIND.label(), id))
    }

    /// Loads every entity of the collection.
    pub async fn list(&self) -> Result<Vec<T>> {
        self.find(T::query()).await
    }

    /// Loads the entities matching a query.
    pub async fn find(&self, query: DocumentQuery) -> Result<Vec<T>> {
        self.store
            .query(query)
            .await?
            .into_iter()
            .map(decode_entity)
            .collect()
    }

    /// Stores a new entity.
    pub async fn insert(&self, entity: &T) -> Result<T> {
        let data = serde_json::to_value(entity)?;
        let document = self.store.create(entity.key(), data).await?;
        decode_entity(document)
    }

    /// Applies a validated patch, stamping `updatedAt`.
    pub async fn update<P: Patch<T>>(
        &self,
        id: &DocumentId,
        patch: &P,
        now: DateTime<Utc>,
    ) -> Result<T> {
        patch.validate()?;
        let mut fields = patch.to_fields()?;
        fields.remove("id");
        fields.insert("updatedAt".to_string(), serde_json::to_value(now)?);

        match self.store.merge(T::key_for(id), fields).await {
            Ok(document) => decode_entity(document),
            Err(DocumentStoreError::NotFound(_)) => Err(DomainError::not_found(T::KIND.label(), id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes an entity that must exist.
    pub async fn delete(&self, id: &DocumentId) -> Result<()> {
        match self.store.delete(T::key_for(id)).await {
            Ok(()) => Ok(()),
            Err(DocumentStoreError::NotFound(_)) => Err(DomainError::not_found(T::KIND.label(), id)),
            Err(err) => Err(err.into()),
        }
    }
}
