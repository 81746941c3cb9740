//! 阶段执行对象契约
//!
//! 阶段执行对象由外部执行层实现，自行驱动任务调度，并在每次阶段级别的
//! 状态变化时回调监听器。协调器只持有根阶段。

use std::sync::Arc;

use super::planner::StageExecutionPlan;
use super::state_machine::StateChangeListener;
use crate::common::ThreadPool;
use crate::core::error::CoordinatorResult;
use crate::core::types::{QueryId, Session, StageId, StageInfo};

pub trait StageExecution: Send + Sync {
    fn stage_id(&self) -> StageId;

    fn add_output_buffer(&self, name: &str) -> CoordinatorResult<()>;

    fn no_more_output_buffers(&self) -> CoordinatorResult<()>;

    fn start(&self) -> CoordinatorResult<()>;

    /// 取消整棵阶段树；`interrupt` 为 true 时中断正在执行的工作
    fn cancel(&self, interrupt: bool);

    /// 取消树中的某一个阶段，不直接改变查询状态
    fn cancel_stage(&self, stage_id: &StageId);

    /// 当前快照
    fn stage_info(&self) -> StageInfo;

    fn add_state_change_listener(&self, listener: StateChangeListener<StageInfo>);
}

/// 构造阶段执行对象所需的查询上下文
#[derive(Clone)]
pub struct StageContext {
    pub query_id: QueryId,
    pub session: Session,
    pub max_pending_splits_per_node: usize,
    pub executor: Arc<ThreadPool>,
}

pub trait StageExecutionFactory: Send + Sync {
    /// 根据执行计划构造根阶段执行对象（不开始调度）
    fn create_stage_execution(
        &self,
        plan: StageExecutionPlan,
        context: StageContext,
    ) -> CoordinatorResult<Arc<dyn StageExecution>>;
}
