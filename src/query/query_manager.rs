//! 查询管理器
//!
//! 负责跟踪协调节点上的全部查询：创建并提交执行、按标识查找、取消、
//! 心跳与超时清理，以及已结束查询的历史保留。

use dashmap::DashMap;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::factory::SqlQueryExecutionFactory;
use super::query_execution::SqlQueryExecution;
use crate::core::error::CoordinatorError;
use crate::core::types::{QueryId, QueryInfo, QueryState, Session, StageId, Statement};

/// 各状态的查询数量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryManagerStats {
    pub total_queries: usize,
    pub queued_queries: usize,
    pub planning_queries: usize,
    pub starting_queries: usize,
    pub running_queries: usize,
    pub finished_queries: usize,
    pub failed_queries: usize,
    pub canceled_queries: usize,
}

pub struct QueryManager {
    factory: SqlQueryExecutionFactory,
    // DashMap 支持并发访问，无需显式加锁
    queries: DashMap<QueryId, Arc<SqlQueryExecution>>,
}

impl QueryManager {
    pub fn new(factory: SqlQueryExecutionFactory) -> Self {
        Self {
            factory,
            queries: DashMap::new(),
        }
    }

    pub fn factory(&self) -> &SqlQueryExecutionFactory {
        &self.factory
    }

    /// 创建并注册查询，在共享线程池上异步启动
    pub fn create_query(
        &self,
        statement: Statement,
        query_text: impl Into<String>,
        session: Session,
    ) -> Arc<SqlQueryExecution> {
        let query_id = QueryId::generate();
        let query_text = query_text.into();
        let execution =
            self.factory
                .create_query_execution(query_id.clone(), query_text.clone(), session, statement);
        self.queries.insert(query_id.clone(), Arc::clone(&execution));
        info!("Query registered: id={}, query={}", query_id, query_text);

        let task_execution = Arc::clone(&execution);
        if !self.factory.executor().execute(move || task_execution.start()) {
            execution.fail(CoordinatorError::internal("query executor is shut down"));
        }
        execution
    }

    pub fn get_query(&self, query_id: &QueryId) -> Option<Arc<SqlQueryExecution>> {
        self.queries.get(query_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_query_info(&self, query_id: &QueryId) -> Option<QueryInfo> {
        self.get_query(query_id).map(|execution| execution.get_query_info())
    }

    pub fn all_query_info(&self) -> Vec<QueryInfo> {
        self.executions()
            .iter()
            .map(|execution| execution.get_query_info())
            .collect()
    }

    /// 取消查询，返回查询是否存在
    pub fn cancel_query(&self, query_id: &QueryId) -> bool {
        match self.get_query(query_id) {
            Some(execution) => {
                info!("Cancel requested for query {}", query_id);
                execution.cancel();
                true
            }
            None => false,
        }
    }

    /// 取消某个阶段，返回所属查询是否存在
    pub fn cancel_stage(&self, stage_id: &StageId) -> bool {
        match self.get_query(stage_id.query_id()) {
            Some(execution) => {
                execution.cancel_stage(stage_id);
                true
            }
            None => false,
        }
    }

    /// 记录客户端心跳，返回查询是否存在
    pub fn record_heartbeat(&self, query_id: &QueryId) -> bool {
        match self.get_query(query_id) {
            Some(execution) => {
                execution.record_heartbeat();
                true
            }
            None => false,
        }
    }

    /// 使超过 `timeout` 未收到心跳的未结束查询失败，返回失败的数量
    pub fn fail_abandoned_queries(&self, timeout: Duration) -> usize {
        let mut abandoned = 0;
        for execution in self.executions() {
            if execution.is_done() {
                continue;
            }
            let idle = execution.time_since_last_heartbeat();
            if idle <= timeout {
                continue;
            }
            warn!(
                "Query-{}: no heartbeat for {:?}, failing abandoned query",
                execution.query_id(),
                idle
            );
            execution.fail(CoordinatorError::internal(format!(
                "Query abandoned: no client heartbeat for {}ms (timeout {}ms)",
                idle.as_millis(),
                timeout.as_millis()
            )));
            abandoned += 1;
        }
        abandoned
    }

    /// 清理已结束的查询（保留最近结束的 `keep` 个），返回清理的数量
    pub fn purge_finished_queries(&self, keep: usize) -> usize {
        let mut finished: Vec<_> = self
            .executions()
            .iter()
            .map(|execution| execution.get_query_info())
            .filter(|info| info.is_done())
            .map(|info| (info.query_stats.end_time, info.query_id))
            .collect();

        // 按结束时间排序，保留最近的
        finished.sort();

        let to_remove = finished.len().saturating_sub(keep);
        for (_, query_id) in finished.into_iter().take(to_remove) {
            self.queries.remove(&query_id);
        }
        to_remove
    }

    /// 按配置执行一轮超时检查与历史清理
    pub fn enforce_limits(&self) {
        let config = self.factory.config();
        self.fail_abandoned_queries(config.client_timeout());
        let purged = self.purge_finished_queries(config.max_query_history);
        if purged > 0 {
            info!("Purged {} finished queries", purged);
        }
    }

    pub fn stats(&self) -> QueryManagerStats {
        let mut stats = QueryManagerStats::default();
        for execution in self.executions() {
            stats.total_queries += 1;
            match execution.query_state() {
                QueryState::Queued => stats.queued_queries += 1,
                QueryState::Planning => stats.planning_queries += 1,
                QueryState::Starting => stats.starting_queries += 1,
                QueryState::Running => stats.running_queries += 1,
                QueryState::Finished => stats.finished_queries += 1,
                QueryState::Failed => stats.failed_queries += 1,
                QueryState::Canceled => stats.canceled_queries += 1,
            }
        }
        stats
    }

    pub fn shutdown(&self) {
        self.factory.shutdown();
    }

    /// 先复制出执行对象再操作，避免持有分片锁时回调外部代码
    fn executions(&self) -> Vec<Arc<SqlQueryExecution>> {
        self.queries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}
