//! Store repository for business clients.
//!
//! Clients are soft-deleted: `delete` flags the row, listings filter it out,
//! and `restore`/`purge` are the explicit ways back out of the trash.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::clients::{BusinessClient, ClientCreate, ClientUpdate},
};
use crate::types::ClientId;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

/// Filter for listing clients. The default hides soft-deleted rows.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    /// `false` (default) lists live clients, `true` lists the trash view.
    pub deleted: bool,
}

pub struct Clients<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Clients<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Pool convenience: fetch one live client.
    pub async fn fetch(pool: &SqlitePool, id: ClientId) -> Result<Option<BusinessClient>> {
        let mut conn = pool.acquire().await.map_err(DbError::from)?;
        Clients::new(&mut conn).get_by_id(id).await
    }

    /// Pool convenience: all live clients.
    pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<BusinessClient>> {
        let mut conn = pool.acquire().await.map_err(DbError::from)?;
        Clients::new(&mut conn).list(&ClientFilter::default()).await
    }

    /// Undo a soft delete. Returns whether a trashed row was restored.
    pub async fn restore(&mut self, id: ClientId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE business_clients SET is_deleted = 0, deleted_at = NULL
             WHERE id = ? AND is_deleted = 1",
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Permanently remove a client and its dependent rows.
    #[instrument(skip(self), err)]
    pub async fn purge(&mut self, id: ClientId) -> Result<bool> {
        let mut tx = sqlx::Connection::begin(&mut *self.db).await?;
        sqlx::query("DELETE FROM delivered_leads WHERE business_client_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM payments WHERE business_client_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM business_clients WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Clients<'c> {
    type CreateRequest = ClientCreate;
    type UpdateRequest = ClientUpdate;
    type Response = BusinessClient;
    type Id = ClientId;
    type Filter = ClientFilter;

    #[instrument(skip(self, request), fields(business_name = %request.business_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let result = sqlx::query(
            "INSERT INTO business_clients (business_name, industry, email, phone, whatsapp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.business_name)
        .bind(&request.industry)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.whatsapp)
        .execute(&mut *self.db)
        .await?;

        let client = sqlx::query_as::<_, BusinessClient>("SELECT * FROM business_clients WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *self.db)
            .await?;
        Ok(client)
    }

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let client = sqlx::query_as::<_, BusinessClient>(
            "SELECT * FROM business_clients WHERE id = ? AND is_deleted = 0",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(client)
    }

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let clients = sqlx::query_as::<_, BusinessClient>(
            "SELECT * FROM business_clients WHERE is_deleted = ? ORDER BY id",
        )
        .bind(filter.deleted)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(clients)
    }

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let result = sqlx::query(
            "UPDATE business_clients SET
                 business_name = COALESCE(?, business_name),
                 industry = COALESCE(?, industry),
                 email = COALESCE(?, email),
                 phone = COALESCE(?, phone),
                 whatsapp = COALESCE(?, whatsapp)
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(&request.business_name)
        .bind(&request.industry)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.whatsapp)
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    /// Soft delete: the row stays, listings hide it.
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE business_clients SET is_deleted = 1, deleted_at = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_client(pool: &SqlitePool, name: &str) -> BusinessClient {
        let mut conn = pool.acquire().await.unwrap();
        Clients::new(&mut conn)
            .create(&ClientCreate {
                business_name: name.into(),
                industry: "restaurants".into(),
                email: Some(format!("{name}@example.com")),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn soft_delete_hides_restore_reveals() {
        let pool = crate::db::connect_memory().await.unwrap();
        let client = create_client(&pool, "acme").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Clients::new(&mut conn);
        assert!(repo.delete(client.id).await.unwrap());
        // Second delete is a no-op.
        assert!(!repo.delete(client.id).await.unwrap());

        assert!(repo.get_by_id(client.id).await.unwrap().is_none());
        assert!(repo.list(&ClientFilter::default()).await.unwrap().is_empty());

        let trash = repo.list(&ClientFilter { deleted: true }).await.unwrap();
        assert_eq!(trash.len(), 1);
        assert!(trash[0].deleted_at.is_some());

        assert!(repo.restore(client.id).await.unwrap());
        let restored = repo.get_by_id(client.id).await.unwrap().unwrap();
        assert!(!restored.is_deleted);
        assert!(restored.deleted_at.is_none());
    }

    #[tokio::test]
    async fn purge_removes_row_for_good() {
        let pool = crate::db::connect_memory().await.unwrap();
        let client = create_client(&pool, "gone").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Clients::new(&mut conn);
        assert!(repo.purge(client.id).await.unwrap());
        assert!(repo.get_by_id(client.id).await.unwrap().is_none());
        assert!(repo
            .list(&ClientFilter { deleted: true })
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn update_patches_only_provided_fields() {
        let pool = crate::db::connect_memory().await.unwrap();
        let client = create_client(&pool, "patchy").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Clients::new(&mut conn);
        let updated = repo
            .update(
                client.id,
                &ClientUpdate {
                    whatsapp: Some("+15550000".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.business_name, "patchy");
        assert_eq!(updated.whatsapp.as_deref(), Some("+15550000"));
    }
}
