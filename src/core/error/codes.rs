//! 查询失败的对外错误码
//!
//! 百位表示类别：0 成功，1 语句，2 规划，3 执行，9 系统。
//! 查询失败时错误码随 `Failure` 记录一起写入查询快照，轮询方据此区分
//! 用户错误与系统错误。

use serde::{Deserialize, Serialize};

/// 对外错误码
///
/// 错误码一旦定义不应随意修改，轮询方可能持久化这些数值。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[default]
    Success = 0,

    // 语句
    /// 语义分析失败
    AnalysisError = 100,
    /// 语句结构过深或过大
    StatementTooComplex = 101,

    // 规划
    /// 逻辑规划或分片失败
    PlanningError = 200,
    /// 分布式执行规划失败
    DistributedPlanningError = 201,

    // 执行
    /// 阶段执行对象操作失败
    StageError = 300,
    /// 远程任务失败
    RemoteTaskError = 301,

    // 系统
    /// 配置无效
    ConfigError = 900,
    /// 内部错误
    InternalError = 901,
    Unknown = 999,
}

impl ErrorCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ErrorCode::Success),
            100 => Some(ErrorCode::AnalysisError),
            101 => Some(ErrorCode::StatementTooComplex),
            200 => Some(ErrorCode::PlanningError),
            201 => Some(ErrorCode::DistributedPlanningError),
            300 => Some(ErrorCode::StageError),
            301 => Some(ErrorCode::RemoteTaskError),
            900 => Some(ErrorCode::ConfigError),
            901 => Some(ErrorCode::InternalError),
            999 => Some(ErrorCode::Unknown),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.as_i32() / 100 {
            0 => ErrorCategory::Success,
            1 => ErrorCategory::Statement,
            2 => ErrorCategory::Planning,
            3 => ErrorCategory::Execution,
            9 => ErrorCategory::System,
            _ => ErrorCategory::Unknown,
        }
    }

    /// 不含细节的通用描述
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "成功",
            ErrorCode::AnalysisError => "语义分析错误",
            ErrorCode::StatementTooComplex => "语句过于复杂",
            ErrorCode::PlanningError => "规划错误",
            ErrorCode::DistributedPlanningError => "分布式规划错误",
            ErrorCode::StageError => "阶段执行错误",
            ErrorCode::RemoteTaskError => "远程任务失败",
            ErrorCode::ConfigError => "配置错误",
            ErrorCode::InternalError => "内部服务器错误",
            ErrorCode::Unknown => "未知错误",
        }
    }

    /// 判断是否为用户错误（语句本身的问题）
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Statement)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{:03} {}", self.as_i32(), self.default_message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Success,
    Statement,
    Planning,
    Execution,
    System,
    Unknown,
}

/// 返回给客户端的错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicError {
    pub code: ErrorCode,
    pub message: String,
}

impl PublicError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn with_default_message(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }
}

/// 协调器错误到客户端错误的映射，内部细节不外泄
pub trait ToPublicError {
    fn to_public_error(&self) -> PublicError;

    fn to_error_code(&self) -> ErrorCode;

    fn to_public_message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_i32() {
        assert_eq!(ErrorCode::from_i32(0), Some(ErrorCode::Success));
        assert_eq!(ErrorCode::from_i32(101), Some(ErrorCode::StatementTooComplex));
        assert_eq!(ErrorCode::from_i32(301), Some(ErrorCode::RemoteTaskError));
        assert_eq!(ErrorCode::from_i32(12345), None);
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::AnalysisError.category(), ErrorCategory::Statement);
        assert_eq!(ErrorCode::DistributedPlanningError.category(), ErrorCategory::Planning);
        assert_eq!(ErrorCode::RemoteTaskError.category(), ErrorCategory::Execution);
        assert_eq!(ErrorCode::InternalError.category(), ErrorCategory::System);
    }

    #[test]
    fn test_user_error() {
        assert!(ErrorCode::StatementTooComplex.is_user_error());
        assert!(!ErrorCode::RemoteTaskError.is_user_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::RemoteTaskError.to_string(), "E301 远程任务失败");
        assert_eq!(ErrorCode::default(), ErrorCode::Success);
    }

    #[test]
    fn test_public_error_default_message() {
        let err = PublicError::with_default_message(ErrorCode::StatementTooComplex);
        assert_eq!(err.code, ErrorCode::StatementTooComplex);
        assert_eq!(err.message, "语句过于复杂");
    }
}
