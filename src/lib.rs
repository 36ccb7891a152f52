//! 医生工作台核心库
//! 提供带令牌刷新的后端 API 客户端与医生身份解析

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;
