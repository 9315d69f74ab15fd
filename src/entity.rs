//! 实体声明
//!
//! 业务实体仍然是普通的 sea-orm 实体，只需额外实现 [`Record`]，
//! 告诉数据访问层主键、必填字段、时间戳和软删除字段分别是哪一列。

use crate::error::{CrudError, CrudResult, Operation};
use sea_orm::{
    ConnectionTrait, EntityTrait, IdenStatic, Iterable, Schema, Value,
};
use std::str::FromStr;

/// 创建 / 更新时间戳字段，字段类型必须为 `DateTimeUtc`
#[derive(Debug, Clone, Copy)]
pub struct Timestamps<C> {
    pub created_at: C,
    pub updated_at: C,
}

/// 软删除字段：`bool` 标记 + `Option<DateTimeUtc>` 删除时间
#[derive(Debug, Clone, Copy)]
pub struct SoftDeleteColumns<C> {
    pub deleted_flag: C,
    pub deleted_at: C,
}

/// 实体的数据访问声明
///
/// ```ignore
/// impl Record for user::Entity {
///     fn id_column() -> user::Column {
///         user::Column::Id
///     }
///
///     fn required_columns() -> Vec<user::Column> {
///         vec![user::Column::Username]
///     }
///
///     fn soft_delete_columns() -> Option<SoftDeleteColumns<user::Column>> {
///         Some(SoftDeleteColumns {
///             deleted_flag: user::Column::IsDeleted,
///             deleted_at: user::Column::DeletedAt,
///         })
///     }
/// }
/// ```
pub trait Record: EntityTrait {
    /// 主键列，创建后不可修改
    fn id_column() -> Self::Column;

    /// 创建时必须显式赋值的列
    fn required_columns() -> Vec<Self::Column> {
        Vec::new()
    }

    fn timestamp_columns() -> Option<Timestamps<Self::Column>> {
        None
    }

    /// 声明后该实体的读操作默认隐藏已删除记录
    fn soft_delete_columns() -> Option<SoftDeleteColumns<Self::Column>> {
        None
    }

    /// 自定义校验，在创建、更新以及计数器 / 开关写入前调用；返回的消息会包装成 `CrudError::Validation`
    fn validate(_model: &Self::ActiveModel) -> Result<(), String> {
        Ok(())
    }
}

/// 实体名（即表名），用于错误信息和日志
pub(crate) fn entity_name<E: EntityTrait>() -> String {
    E::default().table_name().to_string()
}

/// 按字段名查找列，未声明的字段返回 `InvalidAttribute`
pub(crate) fn resolve_column<E: EntityTrait>(attribute: &str) -> CrudResult<E::Column> {
    E::Column::from_str(attribute).map_err(|_| {
        log::warn!(
            "[cathaybot-db] {} 没有字段 `{}`，可用字段: {}",
            entity_name::<E>(),
            attribute,
            attribute_names::<E>().join(", ")
        );
        CrudError::invalid_attribute(entity_name::<E>(), attribute)
    })
}

/// 实体声明的全部字段名
pub fn attribute_names<E: EntityTrait>() -> Vec<String> {
    E::Column::iter()
        .map(|column| column.as_str().to_owned())
        .collect()
}

/// 错误信息里展示的值
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Bool(Some(v)) => v.to_string(),
        Value::TinyInt(Some(v)) => v.to_string(),
        Value::SmallInt(Some(v)) => v.to_string(),
        Value::Int(Some(v)) => v.to_string(),
        Value::BigInt(Some(v)) => v.to_string(),
        Value::TinyUnsigned(Some(v)) => v.to_string(),
        Value::SmallUnsigned(Some(v)) => v.to_string(),
        Value::Unsigned(Some(v)) => v.to_string(),
        Value::BigUnsigned(Some(v)) => v.to_string(),
        Value::String(Some(v)) => v.to_string(),
        other => format!("{other:?}"),
    }
}

/// 若表不存在则按实体定义建表
pub async fn create_table<C, E>(db: &C, entity: E) -> CrudResult<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    db.execute(backend.build(schema.create_table_from_entity(entity).if_not_exists()))
        .await
        .map_err(CrudError::storage(Operation::Schema))?;

    log::info!("[cathaybot-db] 已确认数据表 {}", entity_name::<E>());
    Ok(())
}
