use crate::adapters::vnpay::VnpayAdapter;
use crate::adapters::ProviderRegistry;
use crate::collaborators::mysql::MySqlCatalog;
use crate::collaborators::TracingSink;
use crate::config::AppConfig;
use crate::services::intents::IntentService;
use crate::services::notifications::NotificationService;
use crate::services::orders::OrderService;
use crate::services::returns::ReturnService;
use crate::store::mysql::MySqlPaymentStore;
use chrono::Duration;
use sqlx::MySqlPool;
use std::sync::Arc;

/// 应用状态, 随 axum 路由共享
pub struct AppState {
    pub config: AppConfig,
    pub db_pool: MySqlPool,
    pub order_service: Arc<OrderService>,
    pub intent_service: Arc<IntentService>,
    pub return_service: Arc<ReturnService>,
    pub notification_service: Arc<NotificationService>,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: MySqlPool) -> Self {
        let store = Arc::new(MySqlPaymentStore::new(db_pool.clone()));
        let catalog = Arc::new(MySqlCatalog::new(db_pool.clone()));
        let sink = Arc::new(TracingSink);

        // 新增网关: 实现 ProviderAdapter 后在这里注册
        let mut providers = ProviderRegistry::new();
        providers.register(Arc::new(VnpayAdapter::new(config.providers.vnpay.clone())));
        let providers = Arc::new(providers);

        let order_service = Arc::new(OrderService::new(store.clone(), catalog));
        let intent_service = Arc::new(IntentService::new(
            store.clone(),
            providers.clone(),
            Duration::minutes(config.payment.intent_ttl_minutes),
        ));
        let return_service = Arc::new(ReturnService::new(
            store.clone(),
            providers.clone(),
            config.payment.fallback_return_url.clone(),
        ));
        let notification_service = Arc::new(NotificationService::new(store, providers, sink));

        Self {
            config,
            db_pool,
            order_service,
            intent_service,
            return_service,
            notification_service,
        }
    }
}
