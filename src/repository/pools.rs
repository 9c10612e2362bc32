use super::{require_id, ResourceRepository};
use crate::domain::model::PoolSpec;
use crate::error::Result;
use tracing::debug;

const KIND: &str = "pool";

impl ResourceRepository {
    /// Store a pool record, overwriting any record with the same id
    pub async fn create_pool(&self, pool: &PoolSpec) -> Result<PoolSpec> {
        require_id(KIND, &pool.base.id)?;
        self.create_record(KIND, &self.keys.pool(&pool.base.id), pool)
            .await?;
        Ok(pool.clone())
    }

    pub async fn get_pool(&self, id: &str) -> Result<PoolSpec> {
        self.get_record(KIND, id, &self.keys.pool(id)).await
    }

    pub async fn list_pools(&self) -> Result<Vec<PoolSpec>> {
        self.list_records(KIND, &self.keys.pools()).await
    }

    /// Apply the non-empty name and description of `input`
    pub async fn update_pool(&self, id: &str, input: &PoolSpec) -> Result<PoolSpec> {
        let mut pool = self.get_pool(id).await?;
        pool.base.merge_from(&input.base);
        pool.base.touch();
        self.update_record(KIND, &self.keys.pool(id), &pool).await?;
        Ok(pool)
    }

    /// Shift the pool's used capacity by `delta` GiB, clamped at zero
    pub async fn adjust_pool_usage(&self, id: &str, delta: i64) -> Result<PoolSpec> {
        let mut pool = self.get_pool(id).await?;
        pool.used_capacity = if delta >= 0 {
            pool.used_capacity.saturating_add(delta.unsigned_abs())
        } else {
            pool.used_capacity.saturating_sub(delta.unsigned_abs())
        };
        pool.refresh_free_capacity();
        pool.base.touch();
        self.update_record(KIND, &self.keys.pool(id), &pool).await?;

        debug!(
            "Pool {} usage now {}/{} GiB",
            id, pool.used_capacity, pool.total_capacity
        );
        Ok(pool)
    }

    pub async fn delete_pool(&self, id: &str) -> Result<()> {
        self.delete_record(KIND, &self.keys.pool(id)).await
    }
}
