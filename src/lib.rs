//! # cathaybot-db
//!
//! CathayBot 的通用数据访问层，基于 sea-orm 封装常用的增删改查。
//!
//! ## 功能特性
//! - 通用 CRUD：按实体声明的主键与字段映射完成增删改查，批量操作在单个事务中执行
//! - 查询构建器：等值、LIKE、IN、范围、比较、NULL 判断以及 AND / OR / NOT 组合
//! - 分页：总数、总页数、上一页 / 下一页等元数据
//! - 软删除：默认隐藏已删除记录，支持恢复与彻底删除
//! - 常用工具：获取或创建、计数器增减、布尔切换、随机抽取等
//!
//! ## 使用示例
//! ```ignore
//! let config = Config::load("configs/config.toml")?;
//! let db = cathaybot_db::db::connect(&config.database).await?;
//! cathaybot_db::entity::create_table(&db, user::Entity).await?;
//!
//! let users = Crud::<user::Entity>::new(db);
//! let alice = users.create(user::ActiveModel { /* ... */ ..Default::default() }).await?;
//!
//! // 分页查询
//! let page = users
//!     .paginate(&Filter::new().eq("role", "admin"), &PageRequest::new(1, 10))
//!     .await?;
//!
//! // 软删除后默认查询不再可见
//! users.soft_delete(alice.id).await?;
//! assert!(users.get(alice.id).await?.is_none());
//! assert!(users.include_deleted().get(alice.id).await?.is_some());
//! ```

// =============================
//          Modules
// =============================

pub mod config;
pub mod crud;
pub mod db;
pub mod entity;
pub mod error;
pub mod helpers;
pub mod pagination;
pub mod query;
pub mod soft_delete;

pub use config::{Config, DatabaseConfig, DatabaseKind, LoggingConfig};
pub use crud::{Crud, ListOptions};
pub use entity::{Record, SoftDeleteColumns, Timestamps};
pub use error::{CrudError, CrudResult, Operation};
pub use pagination::{Page, PageRequest};
pub use query::{Filter, Predicate};
pub use soft_delete::Visibility;

/// 常用类型一次性导入
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crud::{Crud, ListOptions};
    pub use crate::entity::{Record, SoftDeleteColumns, Timestamps};
    pub use crate::error::{CrudError, CrudResult};
    pub use crate::pagination::{Page, PageRequest};
    pub use crate::query::Filter;
    pub use crate::soft_delete::Visibility;
}
