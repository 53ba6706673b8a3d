//! # 管理服务模块
//!
//! HTTP服务器、路由、处理器与中间件

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use server::{AppContext, AppState, ManagementServer};
