//! 数据模型模块
//! 后端信封、会话令牌、用户资料与医生目录

pub mod auth;
pub mod doctor;
pub mod envelope;
pub mod user;
