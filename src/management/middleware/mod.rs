//! # 中间件模块

pub mod auth;

pub use auth::{AuthContext, JwtValidator, auth as auth_middleware};
