//! 核心数据模型
//!
//! 查询、阶段、任务的标识与状态，以及对外快照结构。

pub mod failure;
pub mod ids;
pub mod query_info;
pub mod session;
pub mod stage_info;
pub mod state;
pub mod statement;

pub use failure::Failure;
pub use ids::{QueryId, StageId, TaskId};
pub use query_info::{QueryInfo, QueryStats};
pub use session::{Input, Session};
pub use stage_info::{StageInfo, TaskInfo};
pub use state::{QueryState, StageState, TaskState};
pub use statement::{Statement, StatementComplexity, StatementLimits};
