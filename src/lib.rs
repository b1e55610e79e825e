pub mod adapters;
pub mod api;
pub mod app_state;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod signing;
pub mod store;
pub mod utils;

// 重新导出关键组件，便于外部调用
pub use app_state::AppState;
pub use config::AppConfig;
pub use services::notifications::SettlementAck;
