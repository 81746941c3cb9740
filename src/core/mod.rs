pub mod error;
pub mod types;

// 错误和结果类型
pub use error::{CoordinatorError, CoordinatorResult, ErrorCode, PublicError, ToPublicError};

// 核心数据类型
pub use types::*;
