use async_trait::async_trait;
use sqlx::Row;
use tender_core::directory::SupplierDirectory;
use tender_core::domain::quotation::BuyerId;
use tender_core::domain::supplier::{SupplierContact, SupplierId};
use tender_core::store::StoreError;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Supplier and buyer contact lookup backed by the `supplier_contact` and `buyer_contact` tables.
pub struct SqlSupplierDirectory {
    pool: DbPool,
}

impl SqlSupplierDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_supplier(&self, contact: &SupplierContact) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO supplier_contact (id, company_name, contact_name, phone)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                company_name = excluded.company_name,
                contact_name = excluded.contact_name,
                phone = excluded.phone",
        )
        .bind(&contact.id.0)
        .bind(&contact.company_name)
        .bind(contact.contact_name.as_deref())
        .bind(contact.phone.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_buyer(&self, buyer_id: &BuyerId, phone: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO buyer_contact (id, phone) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET phone = excluded.phone",
        )
        .bind(&buyer_id.0)
        .bind(phone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SupplierDirectory for SqlSupplierDirectory {
    async fn find(&self, supplier_id: &SupplierId) -> Result<Option<SupplierContact>, StoreError> {
        let row = sqlx::query(
            "SELECT id, company_name, contact_name, phone FROM supplier_contact WHERE id = ?",
        )
        .bind(&supplier_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let contact = SupplierContact {
            id: SupplierId(row.try_get("id").map_err(RepositoryError::from)?),
            company_name: row.try_get("company_name").map_err(RepositoryError::from)?,
            contact_name: row.try_get("contact_name").map_err(RepositoryError::from)?,
            phone: row.try_get("phone").map_err(RepositoryError::from)?,
        };
        Ok(Some(contact))
    }

    async fn buyer_phone(&self, buyer_id: &BuyerId) -> Result<Option<String>, StoreError> {
        let phone = sqlx::query_scalar::<_, String>("SELECT phone FROM buyer_contact WHERE id = ?")
            .bind(&buyer_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(phone)
    }
}
