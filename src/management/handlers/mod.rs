//! # 处理器模块

pub mod integrations;
