//! 业务服务层

pub mod doctor_api;
pub mod doctor_resolver;

pub use doctor_api::{DoctorApi, DoctorDirectory};
pub use doctor_resolver::DoctorResolver;
