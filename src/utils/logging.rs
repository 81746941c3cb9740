//! 协调器日志
//!
//! 文件输出带线程名，工作线程名（`query-scheduler-N`）与消息中的
//! `Query-<id>` 前缀一起定位一次查询的全部日志。

use crate::config::LogConfig;
use crate::core::error::{CoordinatorError, CoordinatorResult};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use parking_lot::Mutex;

static LOGGER_HANDLE: Mutex<Option<LoggerHandle>> = Mutex::new(None);

/// 按配置启动文件日志
///
/// 重复初始化返回错误，已有的日志句柄保持不变。
pub fn init(config: &LogConfig) -> CoordinatorResult<()> {
    let mut guard = LOGGER_HANDLE.lock();
    if guard.is_some() {
        return Err(CoordinatorError::config("日志系统已初始化"));
    }

    let handle = Logger::try_with_str(&config.level)
        .map_err(|e| CoordinatorError::config(format!("无效的日志级别 {}: {}", config.level, e)))?
        .log_to_file(
            FileSpec::default()
                .basename(&config.file)
                .directory(&config.dir),
        )
        .rotate(
            Criterion::Size(config.max_file_size),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.max_files),
        )
        .format_for_files(flexi_logger::with_thread)
        .write_mode(WriteMode::Async)
        .append()
        .start()
        .map_err(|e| CoordinatorError::config(format!("日志系统启动失败: {}", e)))?;

    *guard = Some(handle);
    log::info!("Logging initialized: {}/{}", config.dir, config.file);
    Ok(())
}

/// 刷新缓冲并释放句柄；异步写线程在句柄释放时退出
pub fn shutdown() {
    if let Some(handle) = LOGGER_HANDLE.lock().take() {
        handle.flush();
    }
}

pub fn is_initialized() -> bool {
    LOGGER_HANDLE.lock().is_some()
}
