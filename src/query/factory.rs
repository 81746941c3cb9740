//! 查询执行工厂
//!
//! 工厂持有所有查询共享的工作线程池，负责线程池的生命周期。

use log::info;
use std::sync::Arc;

use super::planner::QueryServices;
use super::query_execution::SqlQueryExecution;
use crate::common::{PoolStats, ThreadPool};
use crate::config::QueryManagerConfig;
use crate::core::error::CoordinatorResult;
use crate::core::types::{QueryId, Session, Statement};

pub struct SqlQueryExecutionFactory {
    config: QueryManagerConfig,
    services: QueryServices,
    executor: Arc<ThreadPool>,
}

impl SqlQueryExecutionFactory {
    pub fn new(config: QueryManagerConfig, services: QueryServices) -> CoordinatorResult<Self> {
        config.validate()?;
        let executor = Arc::new(ThreadPool::new(
            config.executor_thread_name.clone(),
            config.executor_threads,
        )?);
        info!(
            "Query execution factory created: {} threads named {}",
            config.executor_threads, config.executor_thread_name
        );
        Ok(Self {
            config,
            services,
            executor,
        })
    }

    pub fn config(&self) -> &QueryManagerConfig {
        &self.config
    }

    /// 创建查询执行对象，不启动
    pub fn create_query_execution(
        &self,
        query_id: QueryId,
        query: impl Into<String>,
        session: Session,
        statement: Statement,
    ) -> Arc<SqlQueryExecution> {
        Arc::new(SqlQueryExecution::new(
            query_id,
            query.into(),
            session,
            statement,
            self.services.clone(),
            self.config.statement_limits(),
            self.config.max_pending_splits_per_node,
            Arc::clone(&self.executor),
        ))
    }

    /// 共享线程池
    pub fn executor(&self) -> &Arc<ThreadPool> {
        &self.executor
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.executor.stats()
    }

    /// 停止接收新任务，已排队的任务执行完后线程退出
    pub fn shutdown(&self) {
        info!("Shutting down query executor {}", self.executor.name());
        self.executor.shutdown();
    }
}
