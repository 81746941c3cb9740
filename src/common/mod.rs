//! 通用基础设施模块
//!
//! 目前只包含协调器工厂共享的工作线程池。

pub mod thread;

pub use thread::{panic_message, PoolStats, ThreadPool};
