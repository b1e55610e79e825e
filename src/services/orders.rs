use crate::collaborators::Catalog;
use crate::domain::entities::{Order, OrderLine};
use crate::domain::enums::{OrderStatus, PaymentStatus};
use crate::domain::CallContext;
use crate::services::ServiceError;
use crate::store::PaymentStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct LineSummary {
    pub course_id: Uuid,
    pub price: Decimal,
    pub expire_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub owner_id: Uuid,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub order_date: DateTime<Utc>,
    pub lines: Vec<LineSummary>,
}

impl OrderSummary {
    fn from_parts(order: &Order, lines: &[OrderLine]) -> Self {
        Self {
            order_id: order.id,
            owner_id: order.owner_id,
            status: order.status,
            total_price: order.total_price,
            order_date: order.order_date,
            lines: lines
                .iter()
                .map(|l| LineSummary {
                    course_id: l.course_id,
                    price: l.price,
                    expire_date: l.expire_date,
                })
                .collect(),
        }
    }
}

/// 订单聚合: 创建 / 取消 / 特权改状态 / 过期清扫
pub struct OrderService {
    store: Arc<dyn PaymentStore>,
    catalog: Arc<dyn Catalog>,
}

impl OrderService {
    pub fn new(store: Arc<dyn PaymentStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    /// 结账建单: 只收公开且非免费的课程, 逐行快照价格与有效期
    pub async fn create_order(
        &self,
        ctx: &CallContext,
        course_ids: &[Uuid],
    ) -> Result<OrderSummary, ServiceError> {
        let owner_id = ctx.caller.ok_or(ServiceError::Unauthorized)?;

        let mut purchasable = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for course_id in course_ids {
            if !seen.insert(*course_id) {
                continue;
            }
            if let Some(course) = self.catalog.get_course(*course_id).await? {
                if course.is_public && !course.is_free {
                    purchasable.push(course);
                }
            }
        }

        if purchasable.is_empty() {
            return Err(ServiceError::EmptyOrder);
        }

        let total: Decimal = purchasable.iter().map(|c| c.price).sum();
        let order = Order::new(owner_id, total);
        let lines: Vec<OrderLine> = purchasable
            .iter()
            .map(|c| OrderLine::snapshot(order.id, c.id, c.price, order.order_date, c.validity_days))
            .collect();

        let mut txn = self.store.begin().await?;
        txn.insert_order(&order, &lines).await?;
        txn.commit().await?;

        info!(order_id = %order.id, owner_id = %owner_id, total = %total, "Order created");
        Ok(OrderSummary::from_parts(&order, &lines))
    }

    /// 取消: 存在已结算支付, 或存在未过期的 Pending 支付时拒绝
    pub async fn cancel_order(&self, ctx: &CallContext, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        if !order.is_cancellable() {
            return Err(ServiceError::Conflict(format!(
                "order {order_id} is {} and cannot be cancelled",
                order.status
            )));
        }

        let now = Utc::now();
        for payment in self.store.find_payments_by_order(order_id).await? {
            match payment.status {
                PaymentStatus::Settled => {
                    return Err(ServiceError::Conflict(format!(
                        "order {order_id} has a settled payment"
                    )));
                }
                // 过期的 Pending 视同可取消
                PaymentStatus::Pending if !payment.is_expired(now) => {
                    return Err(ServiceError::Conflict(format!(
                        "order {order_id} has an unexpired pending payment"
                    )));
                }
                _ => {}
            }
        }

        let mut txn = self.store.begin().await?;
        txn.set_order_status(order_id, OrderStatus::Cancel).await?;
        txn.commit().await?;

        info!(order_id = %order_id, caller = ?ctx.caller, "Order cancelled");
        Ok(())
    }

    /// 特权覆写: 绕过全部守卫, 与结算驱动的状态变化区分记录
    pub async fn set_status(
        &self,
        ctx: &CallContext,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        if self.store.find_order(order_id).await?.is_none() {
            return Err(ServiceError::OrderNotFound(order_id));
        }

        let mut txn = self.store.begin().await?;
        txn.set_order_status(order_id, status).await?;
        txn.commit().await?;

        warn!(
            order_id = %order_id,
            status = %status,
            actor = ?ctx.caller,
            override_ = true,
            "Order status overridden administratively"
        );
        Ok(())
    }

    pub async fn order_summary(&self, order_id: Uuid) -> Result<OrderSummary, ServiceError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        let lines = self.store.find_order_lines(order_id).await?;
        Ok(OrderSummary::from_parts(&order, &lines))
    }

    /// 对账清扫: 超过有效期的 Pending 支付置为 Failed
    pub async fn expire_stale_payments(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        Ok(self.store.expire_stale_payments(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CourseInfo, MockCatalog};
    use crate::store::memory::MemoryStore;
    use rust_decimal_macros::dec;

    fn ctx(owner: Uuid) -> CallContext {
        CallContext::new(Some(owner), "203.0.113.9", "vn")
    }

    fn course(price: Decimal, is_public: bool, is_free: bool) -> CourseInfo {
        CourseInfo {
            id: Uuid::new_v4(),
            price,
            validity_days: 30,
            is_public,
            is_free,
        }
    }

    #[tokio::test]
    async fn create_order_filters_hidden_and_free_courses() {
        let public = course(dec!(200000), true, false);
        let hidden = course(dec!(100000), false, false);
        let free = course(dec!(0), true, true);

        let mut catalog = MockCatalog::new();
        for c in [public.clone(), hidden.clone(), free.clone()] {
            let cloned = c.clone();
            catalog
                .expect_get_course()
                .withf(move |id| *id == cloned.id)
                .returning(move |_| Ok(Some(c.clone())));
        }

        let store = Arc::new(MemoryStore::new());
        let service = OrderService::new(store.clone(), Arc::new(catalog));

        let owner = Uuid::new_v4();
        let summary = service
            .create_order(&ctx(owner), &[public.id, hidden.id, free.id])
            .await
            .unwrap();

        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.total_price, dec!(200000));
        assert_eq!(summary.status, OrderStatus::Draft);

        let persisted = store.find_order(summary.order_id).await.unwrap().unwrap();
        assert_eq!(persisted.total_price, dec!(200000));
    }

    #[tokio::test]
    async fn create_order_with_nothing_purchasable_is_rejected() {
        let free = course(dec!(0), true, true);
        let mut catalog = MockCatalog::new();
        let clone = free.clone();
        catalog
            .expect_get_course()
            .returning(move |_| Ok(Some(clone.clone())));

        let service = OrderService::new(Arc::new(MemoryStore::new()), Arc::new(catalog));
        let result = service.create_order(&ctx(Uuid::new_v4()), &[free.id]).await;
        assert!(matches!(result, Err(ServiceError::EmptyOrder)));
    }

    #[tokio::test]
    async fn create_order_requires_caller() {
        let service = OrderService::new(Arc::new(MemoryStore::new()), Arc::new(MockCatalog::new()));
        let anon = CallContext::anonymous("203.0.113.9");
        let result = service.create_order(&anon, &[Uuid::new_v4()]).await;
        assert!(matches!(result, Err(ServiceError::Unauthorized)));
    }
}
