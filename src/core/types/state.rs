//! 查询、阶段、任务的生命周期状态
//!
//! 查询状态只能沿 QUEUED → PLANNING → STARTING → RUNNING → 终态 前进，
//! 取消与失败可以从任意非终态到达。阶段与任务状态由外部执行层维护，
//! 协调器只读取它们。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 查询生命周期状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    /// 已提交，尚未开始规划
    #[default]
    Queued,
    /// 正在分析与规划
    Planning,
    /// 规划完成，根阶段正在启动
    Starting,
    /// 至少有一个任务已调度
    Running,
    Finished,
    Failed,
    Canceled,
}

impl QueryState {
    /// 是否为终态
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            QueryState::Finished | QueryState::Failed | QueryState::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Planning => "PLANNING",
            QueryState::Starting => "STARTING",
            QueryState::Running => "RUNNING",
            QueryState::Finished => "FINISHED",
            QueryState::Failed => "FAILED",
            QueryState::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 阶段状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageState {
    Planned,
    Scheduling,
    Scheduled,
    Running,
    Finished,
    Canceled,
    Failed,
}

impl StageState {
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            StageState::Finished | StageState::Canceled | StageState::Failed
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageState::Planned => "PLANNED",
            StageState::Scheduling => "SCHEDULING",
            StageState::Scheduled => "SCHEDULED",
            StageState::Running => "RUNNING",
            StageState::Finished => "FINISHED",
            StageState::Canceled => "CANCELED",
            StageState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Planned,
    Running,
    Finished,
    Canceled,
    Failed,
}

impl TaskState {
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Canceled | TaskState::Failed
        )
    }
}
