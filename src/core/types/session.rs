//! 会话与输入描述

use serde::{Deserialize, Serialize};

/// 提交查询的会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: String,
    pub source: Option<String>,
    pub catalog: String,
    pub schema: String,
}

impl Session {
    pub fn new(user: impl Into<String>, catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            source: None,
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// 查询声明读取的输入表
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl Input {
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            table: table.into(),
            columns,
        }
    }
}
