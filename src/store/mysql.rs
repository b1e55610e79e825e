use crate::domain::entities::{
    Merchant, Order, OrderLine, Payment, PaymentDestination, PaymentSignature, PaymentTransaction,
};
use crate::domain::enums::{Currency, OrderStatus, PaymentStatus, TransactionOutcome};
use crate::store::{PaymentStore, SettlementTxn, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row, Transaction};
use std::str::FromStr;
use uuid::Uuid;

pub struct MySqlPaymentStore {
    pool: MySqlPool,
}

impl MySqlPaymentStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn get_uuid(row: &MySqlRow, column: &str) -> Result<Uuid, StoreError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

fn get_enum<T: FromStr>(row: &MySqlRow, column: &str) -> Result<T, StoreError> {
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|_| StoreError::Corrupt(format!("{column}: unknown value {raw}")))
}

fn order_from_row(row: &MySqlRow) -> Result<Order, StoreError> {
    Ok(Order {
        id: get_uuid(row, "id")?,
        owner_id: get_uuid(row, "owner_id")?,
        total_price: row.try_get("total_price")?,
        status: get_enum::<OrderStatus>(row, "status")?,
        order_date: row.try_get("order_date")?,
    })
}

fn line_from_row(row: &MySqlRow) -> Result<OrderLine, StoreError> {
    Ok(OrderLine {
        id: get_uuid(row, "id")?,
        order_id: get_uuid(row, "order_id")?,
        course_id: get_uuid(row, "course_id")?,
        price: row.try_get("price")?,
        order_date: row.try_get("order_date")?,
        expire_date: row.try_get("expire_date")?,
    })
}

fn payment_from_row(row: &MySqlRow) -> Result<Payment, StoreError> {
    Ok(Payment {
        id: get_uuid(row, "id")?,
        order_id: get_uuid(row, "order_id")?,
        destination_id: row.try_get("destination_id")?,
        merchant_id: row.try_get("merchant_id")?,
        required_amount: row.try_get("required_amount")?,
        currency: get_enum::<Currency>(row, "currency")?,
        expire_date: row.try_get("expire_date")?,
        status: get_enum::<PaymentStatus>(row, "status")?,
        paid_amount: row.try_get("paid_amount")?,
        last_message: row.try_get("last_message")?,
        last_update_at: row.try_get("last_update_at")?,
    })
}

fn signature_from_row(row: &MySqlRow) -> Result<PaymentSignature, StoreError> {
    Ok(PaymentSignature {
        id: get_uuid(row, "id")?,
        payment_id: get_uuid(row, "payment_id")?,
        sign_value: row.try_get("sign_value")?,
        sign_date: row.try_get("sign_date")?,
        sign_owner: row.try_get("sign_owner")?,
        is_valid: row.try_get("is_valid")?,
    })
}

fn destination_from_row(row: &MySqlRow) -> Result<PaymentDestination, StoreError> {
    Ok(PaymentDestination {
        id: row.try_get("id")?,
        short_name: row.try_get("short_name")?,
        name: row.try_get("name")?,
    })
}

fn merchant_from_row(row: &MySqlRow) -> Result<Merchant, StoreError> {
    Ok(Merchant {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        short_name: row.try_get("short_name")?,
        code: row.try_get("code")?,
        return_url: row.try_get("return_url")?,
    })
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, order_id, destination_id, merchant_id, required_amount, currency,
           expire_date, status, paid_amount, last_message, last_update_at
    FROM payments
"#;

#[async_trait]
impl PaymentStore for MySqlPaymentStore {
    async fn begin(&self) -> Result<Box<dyn SettlementTxn>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlTxn { tx }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT id, owner_id, total_price, status, order_date FROM orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_order_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, order_id, course_id, price, order_date, expire_date FROM order_lines WHERE order_id = ?",
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(line_from_row).collect()
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError> {
        // 交易引用即 Payment id 的字符串形式
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE id = ?"))
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_payments_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_PAYMENT} WHERE order_id = ?"))
            .bind(order_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn find_signature_by_payment(&self, payment_id: Uuid) -> Result<Option<PaymentSignature>, StoreError> {
        let row = sqlx::query(
            "SELECT id, payment_id, sign_value, sign_date, sign_owner, is_valid FROM payment_signatures WHERE payment_id = ?",
        )
        .bind(payment_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(signature_from_row).transpose()
    }

    async fn find_destination(&self, id: &str) -> Result<Option<PaymentDestination>, StoreError> {
        let row = sqlx::query("SELECT id, short_name, name FROM payment_destinations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(destination_from_row).transpose()
    }

    async fn find_merchant(&self, id: &str) -> Result<Option<Merchant>, StoreError> {
        let row = sqlx::query("SELECT id, name, short_name, code, return_url FROM merchants WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(merchant_from_row).transpose()
    }

    async fn find_merchant_by_short_name(&self, short_name: &str) -> Result<Option<Merchant>, StoreError> {
        let row = sqlx::query("SELECT id, name, short_name, code, return_url FROM merchants WHERE short_name = ?")
            .bind(short_name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(merchant_from_row).transpose()
    }

    async fn expire_stale_payments(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, last_message = 'expired before settlement', last_update_at = ?
            WHERE status = ? AND expire_date < ?
            "#,
        )
        .bind(PaymentStatus::Failed.to_string())
        .bind(now)
        .bind(PaymentStatus::Pending.to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

pub struct MySqlTxn {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl SettlementTxn for MySqlTxn {
    async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (id, owner_id, total_price, status, order_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(order.id.to_string())
        .bind(order.owner_id.to_string())
        .bind(order.total_price)
        .bind(order.status.to_string())
        .bind(order.order_date)
        .execute(&mut *self.tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, course_id, price, order_date, expire_date)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(line.id.to_string())
            .bind(line.order_id.to_string())
            .bind(line.course_id.to_string())
            .bind(line.price)
            .bind(line.order_date)
            .bind(line.expire_date)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, destination_id, merchant_id, required_amount, currency,
                expire_date, status, paid_amount, last_message, last_update_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.order_id.to_string())
        .bind(&payment.destination_id)
        .bind(&payment.merchant_id)
        .bind(payment.required_amount)
        .bind(payment.currency.to_string())
        .bind(payment.expire_date)
        .bind(payment.status.to_string())
        .bind(payment.paid_amount)
        .bind(&payment.last_message)
        .bind(payment.last_update_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_signature(&mut self, signature: &PaymentSignature) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payment_signatures (id, payment_id, sign_value, sign_date, sign_owner, is_valid)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(signature.id.to_string())
        .bind(signature.payment_id.to_string())
        .bind(&signature.sign_value)
        .bind(signature.sign_date)
        .bind(&signature.sign_owner)
        .bind(signature.is_valid)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &PaymentTransaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (id, payment_id, message, raw_payload, outcome, amount, date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.payment_id.to_string())
        .bind(&transaction.message)
        .bind(&transaction.raw_payload)
        .bind(transaction.outcome.to_string())
        .bind(transaction.amount)
        .bind(transaction.date)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_payment_by_reference(&mut self, reference: &str) -> Result<Option<Payment>, StoreError> {
        // 行锁保证同一 Payment 的并发投递串行通过幂等闸门
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE id = ? FOR UPDATE"))
            .bind(reference)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT id, owner_id, total_price, status, order_date FROM orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, order_id, course_id, price, order_date, expire_date FROM order_lines WHERE order_id = ?",
        )
        .bind(order_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(line_from_row).collect()
    }

    async fn settled_amount(&mut self, payment_id: Uuid) -> Result<Decimal, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM payment_transactions WHERE payment_id = ? AND outcome = ?",
        )
        .bind(payment_id.to_string())
        .bind(TransactionOutcome::Settled.to_string())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.try_get::<Decimal, _>("total")?)
    }

    async fn update_payment_outcome(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        paid_amount: Decimal,
        last_message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // 条件更新: 只允许离开 Pending 一次
        let result = sqlx::query(
            "UPDATE payments SET status = ?, paid_amount = ?, last_message = ?, last_update_at = ? WHERE id = ? AND status = ?",
        )
        .bind(status.to_string())
        .bind(paid_amount)
        .bind(last_message)
        .bind(at)
        .bind(payment_id.to_string())
        .bind(PaymentStatus::Pending.to_string())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("pending payment {payment_id}")));
        }
        Ok(())
    }

    async fn set_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        // 幂等写: 重复置为同一状态不算错误
        sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(order_id.to_string())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn remove_cart_items(&mut self, owner_id: Uuid, course_ids: &[Uuid]) -> Result<(), StoreError> {
        for course_id in course_ids {
            sqlx::query("DELETE FROM cart_items WHERE owner_id = ? AND course_id = ?")
                .bind(owner_id.to_string())
                .bind(course_id.to_string())
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn increment_purchase(&mut self, owner_id: Uuid, course_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO course_interactions (owner_id, course_id, purchase_count)
            VALUES (?, ?, 1)
            ON DUPLICATE KEY UPDATE purchase_count = purchase_count + 1
            "#,
        )
        .bind(owner_id.to_string())
        .bind(course_id.to_string())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
