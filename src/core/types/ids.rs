//! 查询、阶段、任务标识

use serde::{Deserialize, Serialize};
use std::fmt;

/// 查询标识，提交时分配，此后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 生成随机查询标识
    ///
    /// 格式为 `<日期>_<时间>_<uuid 前 8 位>`，保证按提交时间大致有序。
    pub fn generate() -> Self {
        let now = chrono::Utc::now();
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", now.format("%Y%m%d_%H%M%S"), &uuid[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 阶段标识，由所属查询与查询内阶段编号组成
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId {
    query_id: QueryId,
    id: String,
}

impl StageId {
    pub fn new(query_id: QueryId, id: impl Into<String>) -> Self {
        Self {
            query_id,
            id: id.into(),
        }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.query_id, self.id)
    }
}

/// 任务标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    stage_id: StageId,
    id: String,
}

impl TaskId {
    pub fn new(stage_id: StageId, id: impl Into<String>) -> Self {
        Self {
            stage_id,
            id: id.into(),
        }
    }

    pub fn stage_id(&self) -> &StageId {
        &self.stage_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stage_id, self.id)
    }
}
