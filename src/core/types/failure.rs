//! 失败记录
//!
//! 远程任务或阶段上报的错误以 `Failure` 形式保存在快照里。列表顺序反映
//! 发现/上报顺序，而不是严重程度。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{CoordinatorError, ErrorCode, ToPublicError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// 错误类型名
    pub error_type: String,
    pub message: String,
    pub error_code: ErrorCode,
    /// 导致本次失败的下层失败
    pub cause: Option<Box<Failure>>,
}

impl Failure {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>, error_code: ErrorCode) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            error_code,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 从协调器错误构造失败记录
    ///
    /// 远程错误直接取出其中的记录，不再包一层。
    pub fn from_error(error: &CoordinatorError) -> Self {
        match error {
            CoordinatorError::Remote(failure) => failure.clone(),
            other => Failure::new(other.type_name(), other.to_string(), other.to_error_code()),
        }
    }

    /// 还原为可传播的错误
    pub fn to_error(&self) -> CoordinatorError {
        CoordinatorError::Remote(self.clone())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by {})", cause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_cause_chain() {
        let root = Failure::new("IoError", "connection reset", ErrorCode::RemoteTaskError);
        let failure = Failure::new("TaskFailed", "split read failed", ErrorCode::RemoteTaskError)
            .with_cause(root);
        assert_eq!(
            failure.to_string(),
            "TaskFailed: split read failed (caused by IoError: connection reset)"
        );
    }

    #[test]
    fn test_from_error_unwraps_remote() {
        let failure = Failure::new("TaskFailed", "boom", ErrorCode::RemoteTaskError);
        let error = failure.to_error();
        assert_eq!(Failure::from_error(&error), failure);
    }

    #[test]
    fn test_from_local_error() {
        let error = CoordinatorError::statement_too_complex("depth 900 exceeds 512");
        let failure = Failure::from_error(&error);
        assert_eq!(failure.error_type, "StatementTooComplex");
        assert_eq!(failure.error_code, ErrorCode::StatementTooComplex);
        assert!(failure.message.contains("depth 900"));
    }
}
