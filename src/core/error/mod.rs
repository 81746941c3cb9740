//! 协调器统一错误类型
//!
//! ## 设计理念
//!
//! 1. 协调器内部所有阶段共用一个 `CoordinatorError`，外部协作者（分析器、
//!    规划器、阶段执行对象）返回的错误原样向上传播
//! 2. 远程任务失败以 `Failure` 记录的形式出现在阶段快照中，通过
//!    `CoordinatorError::Remote` 还原为错误
//! 3. 取消是正常终态，不属于错误

use thiserror::Error;

pub mod codes;

pub use codes::{ErrorCategory, ErrorCode, PublicError, ToPublicError};

use crate::core::types::Failure;

/// 协调器错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error("语句过于复杂: {0}")]
    StatementTooComplex(String),

    #[error("分析错误: {0}")]
    Analysis(String),

    #[error("规划错误: {0}")]
    Planning(String),

    #[error("分布式规划错误: {0}")]
    DistributedPlanning(String),

    #[error("阶段执行错误: {0}")]
    Stage(String),

    #[error("远程任务失败: {0}")]
    Remote(Failure),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的结果类型
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

impl CoordinatorError {
    pub fn statement_too_complex(msg: impl Into<String>) -> Self {
        Self::StatementTooComplex(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn distributed_planning(msg: impl Into<String>) -> Self {
        Self::DistributedPlanning(msg.into())
    }

    pub fn stage(msg: impl Into<String>) -> Self {
        Self::Stage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 错误类型名，写入 `Failure::error_type`
    pub fn type_name(&self) -> &'static str {
        match self {
            CoordinatorError::StatementTooComplex(_) => "StatementTooComplex",
            CoordinatorError::Analysis(_) => "Analysis",
            CoordinatorError::Planning(_) => "Planning",
            CoordinatorError::DistributedPlanning(_) => "DistributedPlanning",
            CoordinatorError::Stage(_) => "Stage",
            CoordinatorError::Remote(_) => "Remote",
            CoordinatorError::Config(_) => "Config",
            CoordinatorError::Internal(_) => "Internal",
        }
    }
}

impl ToPublicError for CoordinatorError {
    fn to_public_error(&self) -> PublicError {
        PublicError::new(self.to_error_code(), self.to_public_message())
    }

    fn to_error_code(&self) -> ErrorCode {
        match self {
            CoordinatorError::StatementTooComplex(_) => ErrorCode::StatementTooComplex,
            CoordinatorError::Analysis(_) => ErrorCode::AnalysisError,
            CoordinatorError::Planning(_) => ErrorCode::PlanningError,
            CoordinatorError::DistributedPlanning(_) => ErrorCode::DistributedPlanningError,
            CoordinatorError::Stage(_) => ErrorCode::StageError,
            CoordinatorError::Remote(failure) => failure.error_code,
            CoordinatorError::Config(_) => ErrorCode::ConfigError,
            CoordinatorError::Internal(_) => ErrorCode::InternalError,
        }
    }

    fn to_public_message(&self) -> String {
        match self {
            // 内部错误不暴露细节
            CoordinatorError::Internal(_) => ErrorCode::InternalError.default_message().to_string(),
            _ => self.to_string(),
        }
    }
}
