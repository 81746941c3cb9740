//! 规划阶段之间传递的描述结构
//!
//! 这些结构由外部分析器/规划器产生和消费，协调器只读取其中少量字段：
//! 逻辑计划中的表扫描（用于提取输入）以及执行计划的输出字段名。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::types::Input;

/// 语义分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub statement_kind: String,
    pub output_names: Vec<String>,
}

/// 计划节点标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNodeId(u64);

impl PlanNodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 计划节点标识分配器
///
/// 逻辑规划与分片共用同一个分配器，保证分片新增的节点不与原计划冲突。
#[derive(Debug, Default)]
pub struct PlanNodeIdAllocator {
    next_id: AtomicU64,
}

impl PlanNodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> PlanNodeId {
        PlanNodeId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// 逻辑计划节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: PlanNodeId,
    pub kind: String,
    /// 表扫描节点读取的表
    pub table: Option<Input>,
    pub sources: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(id: PlanNodeId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            table: None,
            sources: Vec::new(),
        }
    }

    pub fn table_scan(id: PlanNodeId, table: Input) -> Self {
        Self {
            id,
            kind: "TableScan".to_string(),
            table: Some(table),
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: PlanNode) -> Self {
        self.sources.push(source);
        self
    }
}

/// 逻辑计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub root: PlanNode,
}

impl Plan {
    pub fn new(root: PlanNode) -> Self {
        Self { root }
    }
}

/// 计划分片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFragment {
    pub id: String,
    pub root: PlanNode,
}

/// 分片树，根分片产生查询的最终输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPlan {
    pub fragment: PlanFragment,
    pub children: Vec<SubPlan>,
}

impl SubPlan {
    pub fn new(fragment: PlanFragment) -> Self {
        Self {
            fragment,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: SubPlan) -> Self {
        self.children.push(child);
        self
    }
}

/// 分布式执行计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExecutionPlan {
    pub fragment: PlanFragment,
    pub field_names: Vec<String>,
    pub sub_stages: Vec<StageExecutionPlan>,
}

impl StageExecutionPlan {
    pub fn new(fragment: PlanFragment, field_names: Vec<String>) -> Self {
        Self {
            fragment,
            field_names,
            sub_stages: Vec::new(),
        }
    }

    pub fn with_sub_stage(mut self, sub_stage: StageExecutionPlan) -> Self {
        self.sub_stages.push(sub_stage);
        self
    }
}
