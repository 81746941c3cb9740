//! querycoord - 分布式 SQL 引擎的单查询协调器
//!
//! 负责驱动已解析的语句经过分析、分布式规划与阶段执行，直至结束，
//! 并向外部轮询方提供一致的查询快照。

pub mod common;
pub mod config;
pub mod core;
pub mod query;
pub mod utils;
