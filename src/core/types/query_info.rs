//! 对外可见的查询快照

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::failure::Failure;
use super::ids::QueryId;
use super::session::{Input, Session};
use super::stage_info::StageInfo;
use super::state::{QueryState, TaskState};
use crate::core::error::{CoordinatorError, CoordinatorResult};

/// 查询计时与任务统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStats {
    pub create_time: DateTime<Utc>,
    pub execution_start_time: Option<DateTime<Utc>>,
    pub last_heartbeat: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,

    /// 从创建到结束（未结束时到当前）的耗时
    pub elapsed_time: Duration,
    /// 从创建到开始执行（未开始时到当前）的排队耗时
    pub queued_time: Duration,
    pub analysis_time: Option<Duration>,
    pub distributed_planning_time: Option<Duration>,
    /// 执行开始时刻相对创建时刻的偏移
    pub execution_start_offset: Option<Duration>,

    pub total_tasks: usize,
    pub running_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}

impl QueryStats {
    /// 汇总阶段树中的任务数
    pub(crate) fn with_task_counts(mut self, root: Option<&StageInfo>) -> Self {
        if let Some(root) = root {
            for stage in root.all_stages() {
                for task in &stage.tasks {
                    self.total_tasks += 1;
                    match task.state {
                        TaskState::Running => self.running_tasks += 1,
                        TaskState::Finished => self.completed_tasks += 1,
                        TaskState::Failed => self.failed_tasks += 1,
                        TaskState::Planned | TaskState::Canceled => {}
                    }
                }
            }
        }
        self
    }
}

/// 查询快照
///
/// 状态与阶段树来自同一次读取；终态查询的快照不再变化。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryInfo {
    pub query_id: QueryId,
    pub session: Session,
    pub state: QueryState,
    pub self_uri: String,
    pub query: String,
    pub field_names: Vec<String>,
    pub inputs: Vec<Input>,
    pub query_stats: QueryStats,
    /// 根阶段快照，分布式规划完成前为空
    pub output_stage: Option<StageInfo>,
    pub failure_info: Option<Failure>,
}

impl QueryInfo {
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// 渲染为 JSON，供轮询方输出
    pub fn to_json(&self) -> CoordinatorResult<String> {
        serde_json::to_string(self)
            .map_err(|e| CoordinatorError::internal(format!("failed to serialize query info: {}", e)))
    }
}
