//! 查询协调
//!
//! 单个查询从提交到结束的全部协调逻辑：状态机、阶段结果聚合、
//! 执行协调与取消传播，以及管理全部查询的注册表。

pub mod aggregator;
pub mod factory;
pub mod planner;
pub mod query_execution;
pub mod query_manager;
pub mod stage;
pub mod state_machine;

pub use aggregator::{first_failure_cause, StageResultAggregator, StageUpdate};
pub use factory::SqlQueryExecutionFactory;
pub use planner::QueryServices;
pub use query_execution::{SqlQueryExecution, ROOT_OUTPUT_BUFFER_NAME};
pub use query_manager::{QueryManager, QueryManagerStats};
pub use stage::{StageContext, StageExecution, StageExecutionFactory};
pub use state_machine::{QueryStateMachine, StateChangeListener};
