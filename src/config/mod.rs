// ==========================================
// 国际贸易订单流转系统 - 配置层
// ==========================================

pub mod config_manager;

pub use config_manager::{config_keys, ConfigManager};
