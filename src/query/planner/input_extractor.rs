//! 从逻辑计划中提取查询输入

use std::collections::HashSet;

use super::plan::PlanNode;
use crate::core::types::Input;

pub struct InputExtractor;

impl InputExtractor {
    /// 先序收集表扫描节点读取的表，按首次出现的顺序去重
    pub fn extract(root: &PlanNode) -> Vec<Input> {
        let mut seen = HashSet::new();
        let mut inputs = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if let Some(table) = &node.table {
                if seen.insert(table.clone()) {
                    inputs.push(table.clone());
                }
            }
            stack.extend(node.sources.iter().rev());
        }
        inputs
    }
}
