use course_settle::{
    api::routes,
    app_state::AppState,
    config::AppConfig,
    infrastructure::{database::init_database, logging::init_logging},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化配置
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    // 初始化日志
    init_logging(&config)?;

    info!("Starting settlement gateway...");

    // 初始化数据库连接
    let db_pool = init_database(&config).await?;

    // 创建应用状态
    let app_state = Arc::new(AppState::new(config.clone(), db_pool));

    // 过期支付的后台清扫任务
    spawn_expiry_sweep(app_state.clone());

    // 初始化路由
    let app = routes::create_router(app_state);

    // 启动服务器
    let addr = config.server.bind_addr()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// 周期性把超过有效期的 Pending 支付置为 Failed
fn spawn_expiry_sweep(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.payment.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match state.order_service.expire_stale_payments(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(n) => info!(expired = n, "Expired stale pending payments"),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    });
}
