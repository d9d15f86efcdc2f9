//! Base repository trait for entity CRUD.
//!
//! A repository is a data access layer for one table. Entities with full
//! lifecycle semantics (currently business clients) implement this trait;
//! append-mostly tables get bespoke handlers instead.

use crate::db::errors::Result;

/// Base repository trait providing common operations, with separate
/// associated types for create requests, update requests and responses.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List entities with filtering
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Update an entity by ID
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;

    /// Delete an entity by ID, returning whether a row was affected
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;
}
