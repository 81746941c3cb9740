//! 阶段与任务快照
//!
//! 快照不可变，由阶段执行对象在每次状态变化时产生。阶段树按构造无环，
//! 查询恰好拥有一个根阶段。

use serde::{Deserialize, Serialize};

use super::failure::Failure;
use super::ids::{StageId, TaskId};
use super::state::{StageState, TaskState};

/// 任务快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub state: TaskState,
    pub failures: Vec<Failure>,
}

impl TaskInfo {
    pub fn new(task_id: TaskId, state: TaskState) -> Self {
        Self {
            task_id,
            state,
            failures: Vec::new(),
        }
    }

    pub fn with_failures(mut self, failures: Vec<Failure>) -> Self {
        self.failures = failures;
        self
    }
}

/// 阶段快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    pub stage_id: StageId,
    pub state: StageState,
    pub tasks: Vec<TaskInfo>,
    pub failures: Vec<Failure>,
    pub sub_stages: Vec<StageInfo>,
}

impl StageInfo {
    pub fn new(stage_id: StageId, state: StageState) -> Self {
        Self {
            stage_id,
            state,
            tasks: Vec::new(),
            failures: Vec::new(),
            sub_stages: Vec::new(),
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<TaskInfo>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_failures(mut self, failures: Vec<Failure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_sub_stages(mut self, sub_stages: Vec<StageInfo>) -> Self {
        self.sub_stages = sub_stages;
        self
    }

    /// 先序遍历整棵阶段树（包括自身）
    pub fn all_stages(&self) -> Vec<&StageInfo> {
        let mut stages = Vec::new();
        let mut stack = vec![self];
        while let Some(stage) = stack.pop() {
            stages.push(stage);
            // 逆序压栈以保持列表顺序
            stack.extend(stage.sub_stages.iter().rev());
        }
        stages
    }

    /// 按标识查找阶段
    pub fn find_stage(&self, stage_id: &StageId) -> Option<&StageInfo> {
        self.all_stages().into_iter().find(|stage| &stage.stage_id == stage_id)
    }
}
