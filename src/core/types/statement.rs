//! 已解析的语句
//!
//! 协调器不理解 SQL 语义，只把语句当作一棵语法树交给分析器。进入分析
//! 之前先用显式的深度/节点数上限检查语句规模，超限时给出确定的
//! `StatementTooComplex` 错误，而不是在递归分析中耗尽栈。

use serde::{Deserialize, Serialize};

use crate::core::error::{CoordinatorError, CoordinatorResult};

/// 语法树节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// 节点类型，例如 `Query`、`Join`、`Table`
    pub kind: String,
    /// 节点文本（标识符、字面量等），可为空
    pub text: Option<String>,
    pub children: Vec<Statement>,
}

impl Statement {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Statement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<Statement>) -> Self {
        self.children.extend(children);
        self
    }

    /// 计算语句的深度与节点数
    ///
    /// 使用显式栈遍历，任意深度的语句都不会在这里溢出。
    pub fn complexity(&self) -> StatementComplexity {
        let mut max_depth = 0;
        let mut node_count = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            node_count += 1;
            max_depth = max_depth.max(depth);
            for child in &node.children {
                stack.push((child, depth + 1));
            }
        }
        StatementComplexity {
            depth: max_depth,
            node_count,
        }
    }
}

// 深层语句的默认递归析构会耗尽栈，改为逐层拆开
impl Drop for Statement {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// 语句规模
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementComplexity {
    pub depth: usize,
    pub node_count: usize,
}

/// 语句规模上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl StatementLimits {
    pub fn new(max_depth: usize, max_nodes: usize) -> Self {
        Self {
            max_depth,
            max_nodes,
        }
    }

    /// 检查语句是否在上限之内
    pub fn check(&self, statement: &Statement) -> CoordinatorResult<StatementComplexity> {
        let complexity = statement.complexity();
        if complexity.depth > self.max_depth {
            return Err(CoordinatorError::statement_too_complex(format!(
                "statement nesting depth {} exceeds the limit of {}",
                complexity.depth, self.max_depth
            )));
        }
        if complexity.node_count > self.max_nodes {
            return Err(CoordinatorError::statement_too_complex(format!(
                "statement has {} syntax nodes, exceeding the limit of {}",
                complexity.node_count, self.max_nodes
            )));
        }
        Ok(complexity)
    }
}

impl Default for StatementLimits {
    fn default() -> Self {
        Self::new(512, 100_000)
    }
}
