//! 常用工具方法
//!
//! 建立在 [`Crud`] 之上的便捷操作：获取或创建、计数器增减、布尔切换、
//! 最近记录、时间范围计数、随机抽取等。读操作同样遵循句柄的软删除可见性。

use crate::crud::{Crud, commit, managed_columns};
use crate::entity::{Record, describe, entity_name, resolve_column};
use crate::error::{CrudError, CrudResult, Operation};
use crate::query::{Filter, apply_order, clamp_rows};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Order};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, IdenStatic, IntoActiveModel,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, Value,
};

impl<E> Crud<E>
where
    E: Record,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    /// 查找满足条件的第一条记录，不存在时用 `defaults` 创建
    ///
    /// `defaults` 需要自行包含查找条件里的字段值。返回 `(记录, 是否新建)`。
    pub async fn get_or_create(
        &self,
        filter: &Filter,
        defaults: E::ActiveModel,
    ) -> CrudResult<(E::Model, bool)> {
        let txn = self.begin(Operation::Create).await?;
        if let Some(found) = self.first_visible(&txn, filter, Operation::Get).await? {
            commit(txn, Operation::Create).await?;
            return Ok((found, false));
        }

        let created = self.insert_one(&txn, defaults, Operation::Create).await?;
        commit(txn, Operation::Create).await?;
        Ok((created, true))
    }

    /// 存在则用 `changes` 更新第一条匹配记录，否则以 `changes` 创建
    pub async fn update_or_create(
        &self,
        filter: &Filter,
        changes: E::ActiveModel,
    ) -> CrudResult<(E::Model, bool)> {
        let txn = self.begin(Operation::Update).await?;
        let result = match self.first_visible(&txn, filter, Operation::Get).await? {
            Some(found) => {
                let id = found.get(E::id_column());
                let updated = self
                    .update_one(&txn, &id, changes, Operation::Update)
                    .await?;
                (updated, false)
            }
            None => (self.insert_one(&txn, changes, Operation::Create).await?, true),
        };
        commit(txn, Operation::Update).await?;
        Ok(result)
    }

    /// 按 ID 列表批量获取，按 ID 升序返回；不存在的 ID 直接忽略
    pub async fn get_by_ids<V, I>(&self, ids: I) -> CrudResult<Vec<E::Model>>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let condition = Condition::all()
            .add(E::id_column().is_in(ids))
            .add(self.scope());
        apply_order(E::find().filter(condition), None, false)?
            .all(self.connection())
            .await
            .map_err(CrudError::storage(Operation::GetMulti))
    }

    /// 按时间字段倒序取最近的记录
    pub async fn get_recent(
        &self,
        limit: u64,
        date_attribute: &str,
        filter: &Filter,
    ) -> CrudResult<Vec<E::Model>> {
        let condition = self.condition(filter)?;
        apply_order(E::find().filter(condition), Some(date_attribute), true)?
            .limit(clamp_rows(limit))
            .all(self.connection())
            .await
            .map_err(CrudError::storage(Operation::GetMulti))
    }

    /// 统计时间字段落在 `[start, end]` 内的记录数，两端均可省略
    pub async fn count_between(
        &self,
        date_attribute: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        filter: &Filter,
    ) -> CrudResult<u64> {
        let mut filter = filter.clone();
        if let Some(start) = start {
            filter = filter.gte(date_attribute, start);
        }
        if let Some(end) = end {
            filter = filter.lte(date_attribute, end);
        }
        self.count(&filter).await
    }

    /// 随机抽取最多 `limit` 条记录
    pub async fn get_random(&self, limit: u64, filter: &Filter) -> CrudResult<Vec<E::Model>> {
        let condition = self.condition(filter)?;
        E::find()
            .filter(condition)
            .order_by(Expr::cust("RANDOM()"), Order::Asc)
            .limit(clamp_rows(limit))
            .all(self.connection())
            .await
            .map_err(CrudError::storage(Operation::GetMulti))
    }

    /// 数值字段加上 `amount`
    pub async fn increment(
        &self,
        id: impl Into<Value>,
        attribute: &str,
        amount: i64,
    ) -> CrudResult<E::Model> {
        self.modify(id.into(), attribute, |value| shift(value, amount, false))
            .await
    }

    /// 数值字段减去 `amount`，结果最小为 0
    pub async fn decrement(
        &self,
        id: impl Into<Value>,
        attribute: &str,
        amount: i64,
    ) -> CrudResult<E::Model> {
        let delta = amount.checked_neg().unwrap_or(i64::MAX);
        self.modify(id.into(), attribute, |value| shift(value, delta, true))
            .await
    }

    /// 布尔字段取反，空值视为 `false`
    pub async fn toggle(&self, id: impl Into<Value>, attribute: &str) -> CrudResult<E::Model> {
        self.modify(id.into(), attribute, |value| match value {
            Value::Bool(current) => Ok(Value::Bool(Some(!current.unwrap_or(false)))),
            _ => Err(Mismatch::Kind("boolean")),
        })
        .await
    }

    /// 读取当前值、计算新值并写回，整个过程在一个事务内
    async fn modify<F>(&self, id: Value, attribute: &str, f: F) -> CrudResult<E::Model>
    where
        F: FnOnce(Value) -> Result<Value, Mismatch>,
    {
        let entity = entity_name::<E>();
        let column = resolve_column::<E>(attribute)?;
        if column.as_str() == E::id_column().as_str() {
            return Err(CrudError::validation(entity, "identity attribute is immutable"));
        }
        if managed_columns::<E>()
            .iter()
            .any(|managed| managed.as_str() == column.as_str())
        {
            return Err(CrudError::validation(
                entity,
                format!("`{attribute}` cannot be changed directly"),
            ));
        }

        let txn = self.begin(Operation::Update).await?;
        let current = self
            .find_visible(&txn, &id, Operation::Update)
            .await?
            .ok_or_else(|| CrudError::not_found(&entity, describe(&id)))?;

        let next = f(current.get(column)).map_err(|mismatch| {
            CrudError::validation(&entity, mismatch.message(attribute))
        })?;

        let mut active = current.into_active_model();
        active.set(column, next);
        if let Some(timestamps) = E::timestamp_columns() {
            active.set(timestamps.updated_at, Utc::now().into());
        }
        E::validate(&active).map_err(|message| CrudError::validation(&entity, message))?;

        let updated = active
            .update(&txn)
            .await
            .map_err(CrudError::storage(Operation::Update))?;
        commit(txn, Operation::Update).await?;
        Ok(updated)
    }
}

/// 字段值与操作不匹配的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mismatch {
    Kind(&'static str),
    Overflow,
}

impl Mismatch {
    fn message(self, attribute: &str) -> String {
        match self {
            Self::Kind(kind) => format!("`{attribute}` is not a {kind} attribute"),
            Self::Overflow => format!("`{attribute}` is out of range"),
        }
    }
}

/// 整数加减，保持原有的整数宽度；空值按 0 处理
fn step<T>(current: Option<T>, delta: i64, floor_at_zero: bool) -> Result<Option<T>, Mismatch>
where
    T: Into<i128> + TryFrom<i128>,
{
    let base: i128 = current.map_or(0, Into::into);
    let mut next = base + i128::from(delta);
    if floor_at_zero {
        next = next.max(0);
    }
    T::try_from(next).map(Some).map_err(|_| Mismatch::Overflow)
}

fn step_float(current: Option<f64>, delta: i64, floor_at_zero: bool) -> f64 {
    let next = current.unwrap_or(0.0) + delta as f64;
    if floor_at_zero { next.max(0.0) } else { next }
}

/// 按字段原本的数值类型计算 `value + delta`
fn shift(value: Value, delta: i64, floor_at_zero: bool) -> Result<Value, Mismatch> {
    let next = match value {
        Value::TinyInt(v) => Value::TinyInt(step(v, delta, floor_at_zero)?),
        Value::SmallInt(v) => Value::SmallInt(step(v, delta, floor_at_zero)?),
        Value::Int(v) => Value::Int(step(v, delta, floor_at_zero)?),
        Value::BigInt(v) => Value::BigInt(step(v, delta, floor_at_zero)?),
        Value::TinyUnsigned(v) => Value::TinyUnsigned(step(v, delta, floor_at_zero)?),
        Value::SmallUnsigned(v) => Value::SmallUnsigned(step(v, delta, floor_at_zero)?),
        Value::Unsigned(v) => Value::Unsigned(step(v, delta, floor_at_zero)?),
        Value::BigUnsigned(v) => Value::BigUnsigned(step(v, delta, floor_at_zero)?),
        Value::Float(v) => Value::Float(Some(
            step_float(v.map(f64::from), delta, floor_at_zero) as f32,
        )),
        Value::Double(v) => Value::Double(Some(step_float(v, delta, floor_at_zero))),
        _ => return Err(Mismatch::Kind("numeric")),
    };
    Ok(next)
}
