//! 数据访问层错误类型

use sea_orm::DbErr;
use std::fmt;
use thiserror::Error;

/// 数据访问层操作结果
pub type CrudResult<T> = Result<T, CrudError>;

/// 出错时正在执行的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    GetMulti,
    Count,
    Exists,
    Paginate,
    Create,
    Update,
    Delete,
    BulkCreate,
    BulkUpdate,
    BulkDelete,
    SoftDelete,
    Restore,
    HardDelete,
    Schema,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::GetMulti => "get_multi",
            Self::Count => "count",
            Self::Exists => "exists",
            Self::Paginate => "paginate",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkCreate => "bulk_create",
            Self::BulkUpdate => "bulk_update",
            Self::BulkDelete => "bulk_delete",
            Self::SoftDelete => "soft_delete",
            Self::Restore => "restore",
            Self::HardDelete => "hard_delete",
            Self::Schema => "schema",
        };
        f.write_str(name)
    }
}

/// 数据访问层错误
///
/// 除 `Storage` 外均为调用方错误，不会在内部被吞掉或重试。
#[derive(Debug, Error)]
pub enum CrudError {
    /// 必填字段缺失或字段格式不合法
    #[error("validation failed on `{entity}`: {message}")]
    Validation { entity: String, message: String },

    /// 目标 ID 不存在（空结果不算错误）
    #[error("`{entity}` not found: {id}")]
    NotFound { entity: String, id: String },

    /// 过滤条件或排序引用了实体上不存在的字段
    #[error("`{entity}` has no attribute `{attribute}`")]
    InvalidAttribute { entity: String, attribute: String },

    /// 页码或每页大小小于 1
    #[error("invalid page request: page={page}, page_size={page_size}")]
    InvalidPage { page: u64, page_size: u64 },

    /// 底层连接 / 事务错误，原样包裹
    #[error("storage error during {operation}: {source}")]
    Storage {
        operation: Operation,
        #[source]
        source: DbErr,
    },
}

impl CrudError {
    pub fn validation(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// 生成 `map_err` 用的闭包，为底层错误附加操作上下文
    pub fn storage(operation: Operation) -> impl FnOnce(DbErr) -> Self {
        move |source| Self::Storage { operation, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
