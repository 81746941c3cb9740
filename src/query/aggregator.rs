//! 阶段结果聚合
//!
//! 把根阶段快照折叠为查询级别的状态决策。快照可能乱序、重复、并发到达；
//! 查询一旦结束，后续快照全部忽略。

use log::debug;
use std::sync::Arc;

use super::state_machine::QueryStateMachine;
use crate::core::error::CoordinatorError;
use crate::core::types::{Failure, QueryState, StageInfo, StageState};

/// 一次聚合产生的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageUpdate {
    /// 查询已结束，快照被忽略
    Ignored,
    /// 没有需要推进的状态
    Unchanged,
    /// 查询被推进到 RUNNING
    Running,
    Finished,
    Canceled,
    Failed,
}

#[derive(Clone)]
pub struct StageResultAggregator {
    state_machine: Arc<QueryStateMachine>,
}

impl StageResultAggregator {
    pub fn new(state_machine: Arc<QueryStateMachine>) -> Self {
        Self { state_machine }
    }

    /// 根据根阶段快照推进查询状态
    ///
    /// 返回值描述的是本次调用的判断；若并发调用方抢先完成了同一转换，
    /// 状态机会拒绝重复转换，结果依然正确。
    pub fn update_state(&self, output_stage: &StageInfo) -> StageUpdate {
        if self.state_machine.is_done() {
            return StageUpdate::Ignored;
        }

        let stage_state = output_stage.state;
        if stage_state.is_done() {
            return match stage_state {
                StageState::Failed => {
                    let cause = first_failure_cause(output_stage)
                        .map(|failure| failure.to_error())
                        .unwrap_or_else(|| {
                            CoordinatorError::stage(format!(
                                "stage {} failed without reporting a cause",
                                output_stage.stage_id
                            ))
                        });
                    self.state_machine.fail(cause);
                    StageUpdate::Failed
                }
                StageState::Canceled => {
                    self.state_machine.cancel();
                    StageUpdate::Canceled
                }
                _ => {
                    self.state_machine.finished();
                    StageUpdate::Finished
                }
            };
        }

        // 零任务的阶段不会把查询推进到 RUNNING
        if self.state_machine.query_state() == QueryState::Starting
            && !output_stage.tasks.is_empty()
            && self.state_machine.running()
        {
            self.state_machine.record_execution_start();
            debug!(
                "Query-{}: output stage {} has {} tasks, query is running",
                self.state_machine.query_id(),
                output_stage.stage_id,
                output_stage.tasks.len()
            );
            return StageUpdate::Running;
        }

        StageUpdate::Unchanged
    }
}

/// 在阶段树中查找第一个失败
///
/// 先序查找：本阶段自身失败列表的第一个元素，否则按顺序检查每个任务的
/// 失败列表，否则按顺序递归子阶段。同一棵树的结果总是相同。
pub fn first_failure_cause(stage: &StageInfo) -> Option<&Failure> {
    let mut stack = vec![stage];
    while let Some(stage) = stack.pop() {
        if let Some(failure) = stage.failures.first() {
            return Some(failure);
        }
        if let Some(failure) = stage.tasks.iter().find_map(|task| task.failures.first()) {
            return Some(failure);
        }
        // 逆序压栈，保证先访问列表中靠前的子阶段
        stack.extend(stage.sub_stages.iter().rev());
    }
    None
}
