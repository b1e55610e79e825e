//! 内存后端: 工作单元在状态副本上落笔, commit 时整体换入。
//! 测试套件用它获得与 MySQL 后端一致的提交/回滚语义。

use crate::domain::entities::{
    Merchant, Order, OrderLine, Payment, PaymentDestination, PaymentSignature, PaymentTransaction,
};
use crate::domain::enums::{OrderStatus, PaymentStatus, TransactionOutcome};
use crate::store::{PaymentStore, SettlementTxn, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default, Clone)]
struct MemState {
    orders: HashMap<Uuid, Order>,
    lines: HashMap<Uuid, Vec<OrderLine>>,
    payments: HashMap<Uuid, Payment>,
    signatures: Vec<PaymentSignature>,
    transactions: Vec<PaymentTransaction>,
    destinations: HashMap<String, PaymentDestination>,
    merchants: HashMap<String, Merchant>,
    cart: HashMap<Uuid, Vec<Uuid>>,
    purchases: HashMap<(Uuid, Uuid), u64>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_destination(&self, destination: PaymentDestination) {
        self.state.lock().await.destinations.insert(destination.id.clone(), destination);
    }

    pub async fn seed_merchant(&self, merchant: Merchant) {
        self.state.lock().await.merchants.insert(merchant.id.clone(), merchant);
    }

    /// 台账行总数, 供测试断言只追加语义
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    pub async fn settled_transaction_count(&self, payment_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.payment_id == payment_id && t.outcome == TransactionOutcome::Settled)
            .count()
    }

    pub async fn seed_cart_item(&self, owner_id: Uuid, course_id: Uuid) {
        self.state.lock().await.cart.entry(owner_id).or_default().push(course_id);
    }

    pub async fn cart_items(&self, owner_id: Uuid) -> Vec<Uuid> {
        self.state.lock().await.cart.get(&owner_id).cloned().unwrap_or_default()
    }

    pub async fn purchase_count(&self, owner_id: Uuid, course_id: Uuid) -> u64 {
        self.state
            .lock()
            .await
            .purchases
            .get(&(owner_id, course_id))
            .copied()
            .unwrap_or(0)
    }
}

struct MemoryTxn {
    guard: OwnedMutexGuard<MemState>,
    work: MemState,
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn SettlementTxn>, StoreError> {
        // 持锁直到 commit 或 drop, 工作单元之间完全串行
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTxn { guard, work }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn find_order_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError> {
        Ok(self.state.lock().await.lines.get(&order_id).cloned().unwrap_or_default())
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.state.lock().await.payments.get(&id).cloned())
    }

    async fn find_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.reference() == reference)
            .cloned())
    }

    async fn find_payments_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_signature_by_payment(&self, payment_id: Uuid) -> Result<Option<PaymentSignature>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .signatures
            .iter()
            .find(|s| s.payment_id == payment_id)
            .cloned())
    }

    async fn find_destination(&self, id: &str) -> Result<Option<PaymentDestination>, StoreError> {
        Ok(self.state.lock().await.destinations.get(id).cloned())
    }

    async fn find_merchant(&self, id: &str) -> Result<Option<Merchant>, StoreError> {
        Ok(self.state.lock().await.merchants.get(id).cloned())
    }

    async fn find_merchant_by_short_name(&self, short_name: &str) -> Result<Option<Merchant>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .merchants
            .values()
            .find(|m| m.short_name == short_name)
            .cloned())
    }

    async fn expire_stale_payments(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut expired = 0;
        for payment in state.payments.values_mut() {
            if payment.status == PaymentStatus::Pending && payment.expire_date < now {
                payment.status = PaymentStatus::Failed;
                payment.last_message = "expired before settlement".to_string();
                payment.last_update_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl SettlementTxn for MemoryTxn {
    async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> Result<(), StoreError> {
        self.work.orders.insert(order.id, order.clone());
        self.work.lines.insert(order.id, lines.to_vec());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.work.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn insert_signature(&mut self, signature: &PaymentSignature) -> Result<(), StoreError> {
        self.work.signatures.push(signature.clone());
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &PaymentTransaction) -> Result<(), StoreError> {
        self.work.transactions.push(transaction.clone());
        Ok(())
    }

    async fn lock_payment_by_reference(&mut self, reference: &str) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .work
            .payments
            .values()
            .find(|p| p.reference() == reference)
            .cloned())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn order_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError> {
        Ok(self.work.lines.get(&order_id).cloned().unwrap_or_default())
    }

    async fn settled_amount(&mut self, payment_id: Uuid) -> Result<Decimal, StoreError> {
        Ok(self
            .work
            .transactions
            .iter()
            .filter(|t| t.payment_id == payment_id && t.outcome == TransactionOutcome::Settled)
            .map(|t| t.amount)
            .sum())
    }

    async fn update_payment_outcome(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        paid_amount: Decimal,
        last_message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let payment = self
            .work
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| StoreError::NotFound(format!("payment {payment_id}")))?;
        payment.status = status;
        payment.paid_amount = paid_amount;
        payment.last_message = last_message.to_string();
        payment.last_update_at = at;
        Ok(())
    }

    async fn set_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        let order = self
            .work
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        order.status = status;
        Ok(())
    }

    async fn remove_cart_items(&mut self, owner_id: Uuid, course_ids: &[Uuid]) -> Result<(), StoreError> {
        if let Some(items) = self.work.cart.get_mut(&owner_id) {
            items.retain(|c| !course_ids.contains(c));
        }
        Ok(())
    }

    async fn increment_purchase(&mut self, owner_id: Uuid, course_id: Uuid) -> Result<(), StoreError> {
        *self.work.purchases.entry((owner_id, course_id)).or_insert(0) += 1;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        *self.guard = std::mem::take(&mut self.work);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    fn order() -> Order {
        Order::new(Uuid::new_v4(), dec!(100))
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let o = order();

        let mut txn = store.begin().await.unwrap();
        assert_ok!(txn.insert_order(&o, &[]).await);
        assert_ok!(txn.commit().await);

        assert!(store.find_order(o.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dropped_txn_rolls_back() {
        let store = MemoryStore::new();
        let o = order();

        {
            let mut txn = store.begin().await.unwrap();
            assert_ok!(txn.insert_order(&o, &[]).await);
            // 未 commit 即丢弃
        }

        assert!(store.find_order(o.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cart_and_counter_writes_roll_back_with_txn() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let course = Uuid::new_v4();
        store.seed_cart_item(owner, course).await;

        {
            let mut txn = store.begin().await.unwrap();
            assert_ok!(txn.remove_cart_items(owner, &[course]).await);
            assert_ok!(txn.increment_purchase(owner, course).await);
            // 未 commit 即丢弃
        }

        assert_eq!(store.cart_items(owner).await, vec![course]);
        assert_eq!(store.purchase_count(owner, course).await, 0);

        let mut txn = store.begin().await.unwrap();
        assert_ok!(txn.remove_cart_items(owner, &[course]).await);
        assert_ok!(txn.increment_purchase(owner, course).await);
        assert_ok!(txn.commit().await);

        assert!(store.cart_items(owner).await.is_empty());
        assert_eq!(store.purchase_count(owner, course).await, 1);
    }

    #[tokio::test]
    async fn expire_sweep_only_touches_stale_pending() {
        let store = MemoryStore::new();
        let fresh = Payment::new(
            Uuid::new_v4(),
            "d".into(),
            "m".into(),
            dec!(10),
            crate::domain::enums::Currency::VND,
            chrono::Duration::minutes(15),
        );
        let mut stale = fresh.clone();
        stale.id = Uuid::new_v4();
        stale.expire_date = Utc::now() - chrono::Duration::minutes(1);

        let mut txn = store.begin().await.unwrap();
        txn.insert_payment(&fresh).await.unwrap();
        txn.insert_payment(&stale).await.unwrap();
        txn.commit().await.unwrap();

        let expired = store.expire_stale_payments(Utc::now()).await.unwrap();
        assert_eq!(expired, 1);
        assert_eq!(
            store.find_payment(stale.id).await.unwrap().unwrap().status,
            PaymentStatus::Failed
        );
        assert_eq!(
            store.find_payment(fresh.id).await.unwrap().unwrap().status,
            PaymentStatus::Pending
        );
    }
}
