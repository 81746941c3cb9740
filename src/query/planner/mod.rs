//! 规划协作方契约
//!
//! 分析、逻辑规划、分片与分布式执行规划都由外部实现，协调器按固定顺序
//! 调用它们。实现可以同步或异步完成，但调用本身在协调器的工作线程上阻塞。

pub mod input_extractor;
pub mod plan;

pub use input_extractor::InputExtractor;
pub use plan::{
    Analysis, Plan, PlanFragment, PlanNode, PlanNodeId, PlanNodeIdAllocator, StageExecutionPlan,
    SubPlan,
};

use std::sync::Arc;

use crate::core::error::CoordinatorResult;
use crate::core::types::{QueryId, Session, Statement};

/// 语义分析
pub trait Analyzer: Send + Sync {
    fn analyze(&self, statement: &Statement, session: &Session) -> CoordinatorResult<Analysis>;
}

/// 由分析结果生成逻辑计划
pub trait LogicalPlanner: Send + Sync {
    fn plan(
        &self,
        analysis: &Analysis,
        session: &Session,
        id_allocator: &PlanNodeIdAllocator,
    ) -> CoordinatorResult<Plan>;
}

/// 将逻辑计划切分为分片树
pub trait DistributedLogicalPlanner: Send + Sync {
    fn create_sub_plans(&self, plan: &Plan, id_allocator: &PlanNodeIdAllocator) -> CoordinatorResult<SubPlan>;
}

/// 将分片树转为可执行的分布式计划
pub trait DistributedExecutionPlanner: Send + Sync {
    fn plan(&self, sub_plan: &SubPlan, session: &Session) -> CoordinatorResult<StageExecutionPlan>;
}

/// 为查询生成对外可访问的地址
pub trait LocationFactory: Send + Sync {
    fn create_query_location(&self, query_id: &QueryId) -> String;
}

/// 协调器依赖的全部外部协作方
#[derive(Clone)]
pub struct QueryServices {
    pub analyzer: Arc<dyn Analyzer>,
    pub logical_planner: Arc<dyn LogicalPlanner>,
    pub distributed_logical_planner: Arc<dyn DistributedLogicalPlanner>,
    pub distributed_execution_planner: Arc<dyn DistributedExecutionPlanner>,
    pub stage_execution_factory: Arc<dyn super::stage::StageExecutionFactory>,
    pub location_factory: Arc<dyn LocationFactory>,
}
