//! 软删除
//!
//! 声明了软删除字段的实体，默认查询会自动附加 `deleted_flag = false`。
//! 状态流转：
//!
//! ```text
//! Active --soft_delete--> SoftDeleted --restore--> Active
//!   |                         |
//!   +-------hard_delete-------+--> Purged（物理删除，不可恢复）
//! ```
//!
//! 对已删除的记录再次调用 `soft_delete` 不会改动任何数据，返回 `false`，
//! 原删除时间保持不变。

use crate::crud::{Crud, commit};
use crate::entity::{Record, SoftDeleteColumns, describe, entity_name};
use crate::error::{CrudError, CrudResult, Operation};
use crate::query::Filter;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    IntoActiveModel, QueryFilter, Value,
};

/// 读操作对软删除记录的可见性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// 只返回未删除的记录
    #[default]
    Active,
    /// 不附加任何删除条件
    IncludeDeleted,
    /// 只返回已软删除的记录
    OnlyDeleted,
}

impl<E> Crud<E>
where
    E: Record,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    /// 同时返回已删除和未删除记录的句柄
    pub fn include_deleted(&self) -> Self {
        self.with_visibility(Visibility::IncludeDeleted)
    }

    /// 只返回已删除记录的句柄
    pub fn only_deleted(&self) -> Self {
        self.with_visibility(Visibility::OnlyDeleted)
    }

    /// 当前可见性对应的隐式条件；未声明软删除字段的实体恒为空条件
    pub(crate) fn scope(&self) -> Condition {
        let Some(columns) = E::soft_delete_columns() else {
            return Condition::all();
        };
        match self.visibility() {
            Visibility::Active => Condition::all().add(columns.deleted_flag.eq(false)),
            Visibility::IncludeDeleted => Condition::all(),
            Visibility::OnlyDeleted => Condition::all().add(columns.deleted_flag.eq(true)),
        }
    }

    /// 软删除：标记删除并记录删除时间
    ///
    /// 返回 `true` 表示本次完成了删除；记录已处于删除状态时返回 `false`。
    /// ID 不存在返回 `NotFound`。
    pub async fn soft_delete(&self, id: impl Into<Value>) -> CrudResult<bool> {
        let columns = soft_delete_columns::<E>()?;
        let id = id.into();

        let txn = self.begin(Operation::SoftDelete).await?;
        let result = E::update_many()
            .col_expr(columns.deleted_flag, Expr::value(true))
            .col_expr(columns.deleted_at, Expr::value(Utc::now()))
            .filter(E::id_column().eq(id.clone()))
            .filter(columns.deleted_flag.eq(false))
            .exec(&txn)
            .await
            .map_err(CrudError::storage(Operation::SoftDelete))?;

        if result.rows_affected == 0 {
            ensure_exists::<E, _>(&txn, &id, Operation::SoftDelete).await?;
            commit(txn, Operation::SoftDelete).await?;
            log::debug!(
                "[cathaybot-db] {} id={} 已处于删除状态",
                entity_name::<E>(),
                describe(&id)
            );
            return Ok(false);
        }

        commit(txn, Operation::SoftDelete).await?;
        log::debug!("[cathaybot-db] {} id={} 已软删除", entity_name::<E>(), describe(&id));
        Ok(true)
    }

    /// 恢复软删除的记录，返回受影响行数；记录本就未删除时为 0
    pub async fn restore(&self, id: impl Into<Value>) -> CrudResult<u64> {
        let columns = soft_delete_columns::<E>()?;
        let id = id.into();

        let txn = self.begin(Operation::Restore).await?;
        let result = E::update_many()
            .col_expr(columns.deleted_flag, Expr::value(false))
            .col_expr(columns.deleted_at, Expr::value(Option::<DateTime<Utc>>::None))
            .filter(E::id_column().eq(id.clone()))
            .filter(columns.deleted_flag.eq(true))
            .exec(&txn)
            .await
            .map_err(CrudError::storage(Operation::Restore))?;

        if result.rows_affected == 0 {
            ensure_exists::<E, _>(&txn, &id, Operation::Restore).await?;
        }
        commit(txn, Operation::Restore).await?;
        Ok(result.rows_affected)
    }

    /// 物理删除，不受可见性影响，任何状态下都可以执行
    pub async fn hard_delete(&self, id: impl Into<Value>) -> CrudResult<bool> {
        let id = id.into();
        let txn = self.begin(Operation::HardDelete).await?;
        let result = E::delete_many()
            .filter(E::id_column().eq(id.clone()))
            .exec(&txn)
            .await
            .map_err(CrudError::storage(Operation::HardDelete))?;
        commit(txn, Operation::HardDelete).await?;

        if result.rows_affected > 0 {
            log::debug!("[cathaybot-db] {} id={} 已彻底删除", entity_name::<E>(), describe(&id));
        }
        Ok(result.rows_affected > 0)
    }

    /// 按条件批量软删除未删除的记录，返回受影响行数
    pub async fn soft_delete_by(&self, filter: &Filter) -> CrudResult<u64> {
        let columns = soft_delete_columns::<E>()?;
        let condition = filter.to_condition::<E>()?;

        let txn = self.begin(Operation::SoftDelete).await?;
        let result = E::update_many()
            .col_expr(columns.deleted_flag, Expr::value(true))
            .col_expr(columns.deleted_at, Expr::value(Utc::now()))
            .filter(condition)
            .filter(columns.deleted_flag.eq(false))
            .exec(&txn)
            .await
            .map_err(CrudError::storage(Operation::SoftDelete))?;
        commit(txn, Operation::SoftDelete).await?;

        log::debug!(
            "[cathaybot-db] {} 批量软删除 {} 条",
            entity_name::<E>(),
            result.rows_affected
        );
        Ok(result.rows_affected)
    }

    /// 按条件批量恢复已删除的记录，返回受影响行数
    pub async fn restore_by(&self, filter: &Filter) -> CrudResult<u64> {
        let columns = soft_delete_columns::<E>()?;
        let condition = filter.to_condition::<E>()?;

        let txn = self.begin(Operation::Restore).await?;
        let result = E::update_many()
            .col_expr(columns.deleted_flag, Expr::value(false))
            .col_expr(columns.deleted_at, Expr::value(Option::<DateTime<Utc>>::None))
            .filter(condition)
            .filter(columns.deleted_flag.eq(true))
            .exec(&txn)
            .await
            .map_err(CrudError::storage(Operation::Restore))?;
        commit(txn, Operation::Restore).await?;
        Ok(result.rows_affected)
    }

    /// 按条件物理删除，忽略可见性，返回删除数量
    pub async fn hard_delete_by(&self, filter: &Filter) -> CrudResult<u64> {
        let condition = filter.to_condition::<E>()?;

        let txn = self.begin(Operation::HardDelete).await?;
        let result = E::delete_many()
            .filter(condition)
            .exec(&txn)
            .await
            .map_err(CrudError::storage(Operation::HardDelete))?;
        commit(txn, Operation::HardDelete).await?;
        Ok(result.rows_affected)
    }
}

fn soft_delete_columns<E: Record>() -> CrudResult<SoftDeleteColumns<E::Column>> {
    E::soft_delete_columns().ok_or_else(|| {
        CrudError::validation(entity_name::<E>(), "entity does not support soft delete")
    })
}

/// 不论删除状态，确认该 ID 的记录存在
async fn ensure_exists<E, C>(db: &C, id: &Value, operation: Operation) -> CrudResult<()>
where
    E: Record,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let found = E::find()
        .filter(E::id_column().eq(id.clone()))
        .one(db)
        .await
        .map_err(CrudError::storage(operation))?;
    match found {
        Some(_) => Ok(()),
        None => Err(CrudError::not_found(entity_name::<E>(), describe(id))),
    }
}
