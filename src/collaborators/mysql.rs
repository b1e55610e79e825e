use crate::collaborators::{Catalog, CollaboratorError, CourseInfo};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

pub struct MySqlCatalog {
    pool: MySqlPool,
}

impl MySqlCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for MySqlCatalog {
    async fn get_course(&self, id: Uuid) -> Result<Option<CourseInfo>, CollaboratorError> {
        let row = sqlx::query(
            "SELECT id, price, validity_days, is_public, is_free FROM courses WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let id: String = r.try_get("id").map_err(|e| CollaboratorError(e.to_string()))?;
                Ok(Some(CourseInfo {
                    id: Uuid::parse_str(&id).map_err(|e| CollaboratorError(e.to_string()))?,
                    price: r.try_get::<Decimal, _>("price").map_err(|e| CollaboratorError(e.to_string()))?,
                    validity_days: r.try_get("validity_days").map_err(|e| CollaboratorError(e.to_string()))?,
                    is_public: r.try_get("is_public").map_err(|e| CollaboratorError(e.to_string()))?,
                    is_free: r.try_get("is_free").map_err(|e| CollaboratorError(e.to_string()))?,
                }))
            }
            None => Ok(None),
        }
    }
}
