//! 通用 CRUD 操作
//!
//! 提供基础的增删改查封装。所有写操作（包括批量操作）都在单个事务中执行：
//! 正常返回时提交，任何错误都会随事务析构而回滚，不会留下部分写入。

use crate::entity::{Record, describe, entity_name};
use crate::error::{CrudError, CrudResult, Operation};
use crate::query::{Filter, apply_order, clamp_rows};
use crate::soft_delete::Visibility;
use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, EntityTrait, IdenStatic, IntoActiveModel, Iterable,
    ModelTrait, PaginatorTrait, PrimaryKeyTrait, QueryFilter, QuerySelect, TransactionTrait,
    Value,
};
use std::fmt;
use std::marker::PhantomData;

/// `get_multi` 的偏移、数量和排序参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub offset: u64,
    pub limit: u64,
    pub order_by: Option<String>,
    pub descending: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
            order_by: None,
            descending: false,
        }
    }
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn order_by(mut self, attribute: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(attribute.into());
        self.descending = descending;
        self
    }
}

/// 某个实体的数据访问句柄
///
/// 内部只持有连接池和可见性，克隆代价很低，可以在多个任务间共享。
///
/// ```ignore
/// let users = Crud::<user::Entity>::new(db);
///
/// let user = users.create(new_user).await?;
/// let found = users.get(user.id).await?;
/// let admins = users
///     .get_multi(&Filter::new().eq("role", "admin"), &ListOptions::new().limit(10))
///     .await?;
/// users.update(user.id, changes).await?;
/// users.delete(user.id).await?;
/// ```
pub struct Crud<E: Record> {
    db: DatabaseConnection,
    visibility: Visibility,
    _entity: PhantomData<E>,
}

impl<E: Record> Clone for Crud<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            visibility: self.visibility,
            _entity: PhantomData,
        }
    }
}

impl<E: Record> fmt::Debug for Crud<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crud")
            .field("entity", &entity_name::<E>())
            .field("visibility", &self.visibility)
            .finish()
    }
}

impl<E> Crud<E>
where
    E: Record,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            visibility: Visibility::default(),
            _entity: PhantomData,
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// 返回使用另一种可见性的新句柄
    pub fn with_visibility(&self, visibility: Visibility) -> Self {
        Self {
            db: self.db.clone(),
            visibility,
            _entity: PhantomData,
        }
    }

    // =============================
    //          Reads
    // =============================

    /// 根据 ID 获取单条记录，不存在返回 `None`
    pub async fn get(&self, id: impl Into<Value>) -> CrudResult<Option<E::Model>> {
        self.find_visible(&self.db, &id.into(), Operation::Get).await
    }

    /// 等值条件的简写，返回第一条匹配记录
    pub async fn get_by(&self, filter: &Filter) -> CrudResult<Option<E::Model>> {
        self.first_visible(&self.db, filter, Operation::Get).await
    }

    /// 获取多条记录，不统计总数
    pub async fn get_multi(&self, filter: &Filter, options: &ListOptions) -> CrudResult<Vec<E::Model>> {
        let condition = self.condition(filter)?;
        let select = apply_order(
            E::find().filter(condition),
            options.order_by.as_deref(),
            options.descending,
        )?;

        select
            .offset(clamp_rows(options.offset))
            .limit(clamp_rows(options.limit))
            .all(&self.db)
            .await
            .map_err(CrudError::storage(Operation::GetMulti))
    }

    /// 统计记录数
    pub async fn count(&self, filter: &Filter) -> CrudResult<u64> {
        let condition = self.condition(filter)?;
        E::find()
            .filter(condition)
            .count(&self.db)
            .await
            .map_err(CrudError::storage(Operation::Count))
    }

    /// 是否存在满足条件的记录
    pub async fn exists(&self, filter: &Filter) -> CrudResult<bool> {
        Ok(self.first_visible(&self.db, filter, Operation::Exists).await?.is_some())
    }

    // =============================
    //          Writes
    // =============================

    /// 创建记录：校验必填字段、写入时间戳后插入
    pub async fn create(&self, model: E::ActiveModel) -> CrudResult<E::Model> {
        let txn = self.begin(Operation::Create).await?;
        let created = self.insert_one(&txn, model, Operation::Create).await?;
        commit(txn, Operation::Create).await?;
        Ok(created)
    }

    /// 合并已赋值的字段并刷新更新时间，ID 不存在时返回 `NotFound`
    pub async fn update(&self, id: impl Into<Value>, changes: E::ActiveModel) -> CrudResult<E::Model> {
        let txn = self.begin(Operation::Update).await?;
        let updated = self
            .update_one(&txn, &id.into(), changes, Operation::Update)
            .await?;
        commit(txn, Operation::Update).await?;
        Ok(updated)
    }

    /// 硬删除单条记录，返回是否删除成功
    pub async fn delete(&self, id: impl Into<Value>) -> CrudResult<bool> {
        let condition = Condition::all()
            .add(E::id_column().eq(id.into()))
            .add(self.scope());
        let affected = self.delete_where(condition, Operation::Delete).await?;
        Ok(affected > 0)
    }

    /// 按条件硬删除，返回删除数量
    pub async fn delete_by(&self, filter: &Filter) -> CrudResult<u64> {
        let condition = self.condition(filter)?;
        self.delete_where(condition, Operation::Delete).await
    }

    /// 批量创建，任意一条失败则整批回滚
    pub async fn bulk_create(&self, models: Vec<E::ActiveModel>) -> CrudResult<Vec<E::Model>> {
        let txn = self.begin(Operation::BulkCreate).await?;
        let mut created = Vec::with_capacity(models.len());
        for model in models {
            created.push(self.insert_one(&txn, model, Operation::BulkCreate).await?);
        }
        commit(txn, Operation::BulkCreate).await?;

        log::debug!("[cathaybot-db] {} 批量创建 {} 条", entity_name::<E>(), created.len());
        Ok(created)
    }

    /// 批量更新，任意 ID 不存在或校验失败则整批回滚
    pub async fn bulk_update<V>(&self, changes: Vec<(V, E::ActiveModel)>) -> CrudResult<Vec<E::Model>>
    where
        V: Into<Value>,
    {
        let txn = self.begin(Operation::BulkUpdate).await?;
        let mut updated = Vec::with_capacity(changes.len());
        for (id, model) in changes {
            updated.push(
                self.update_one(&txn, &id.into(), model, Operation::BulkUpdate)
                    .await?,
            );
        }
        commit(txn, Operation::BulkUpdate).await?;
        Ok(updated)
    }

    /// 批量硬删除，任意 ID 不存在则整批回滚；重复的 ID 只删除一次，返回删除数量
    pub async fn bulk_delete<V, I>(&self, ids: I) -> CrudResult<u64>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let mut unique: Vec<Value> = Vec::new();
        for id in ids {
            let id = id.into();
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        let txn = self.begin(Operation::BulkDelete).await?;
        let mut affected = 0;
        for id in unique {
            let result = E::delete_many()
                .filter(E::id_column().eq(id.clone()))
                .filter(self.scope())
                .exec(&txn)
                .await
                .map_err(CrudError::storage(Operation::BulkDelete))?;
            if result.rows_affected == 0 {
                log::warn!(
                    "[cathaybot-db] {} 批量删除中止，ID {} 不存在",
                    entity_name::<E>(),
                    describe(&id)
                );
                return Err(CrudError::not_found(entity_name::<E>(), describe(&id)));
            }
            affected += result.rows_affected;
        }
        commit(txn, Operation::BulkDelete).await?;
        Ok(affected)
    }

    // =============================
    //          Internals
    // =============================

    pub(crate) async fn begin(&self, operation: Operation) -> CrudResult<DatabaseTransaction> {
        self.db.begin().await.map_err(CrudError::storage(operation))
    }

    /// 过滤条件 AND 可见性条件
    pub(crate) fn condition(&self, filter: &Filter) -> CrudResult<Condition> {
        Ok(Condition::all()
            .add(filter.to_condition::<E>()?)
            .add(self.scope()))
    }

    pub(crate) async fn find_visible<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &Value,
        operation: Operation,
    ) -> CrudResult<Option<E::Model>> {
        E::find()
            .filter(E::id_column().eq(id.clone()))
            .filter(self.scope())
            .one(db)
            .await
            .map_err(CrudError::storage(operation))
    }

    pub(crate) async fn first_visible<C: ConnectionTrait>(
        &self,
        db: &C,
        filter: &Filter,
        operation: Operation,
    ) -> CrudResult<Option<E::Model>> {
        let condition = self.condition(filter)?;
        apply_order(E::find().filter(condition), None, false)?
            .one(db)
            .await
            .map_err(CrudError::storage(operation))
    }

    pub(crate) async fn insert_one<C: ConnectionTrait>(
        &self,
        db: &C,
        model: E::ActiveModel,
        operation: Operation,
    ) -> CrudResult<E::Model> {
        let model = prepare_create::<E>(model)?;
        let created = model.insert(db).await.map_err(CrudError::storage(operation))?;

        log::debug!(
            "[cathaybot-db] {} 已创建 id={}",
            entity_name::<E>(),
            describe(&created.get(E::id_column()))
        );
        Ok(created)
    }

    pub(crate) async fn update_one<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &Value,
        changes: E::ActiveModel,
        operation: Operation,
    ) -> CrudResult<E::Model> {
        let entity = entity_name::<E>();
        let current = self
            .find_visible(db, id, operation)
            .await?
            .ok_or_else(|| CrudError::not_found(&entity, describe(id)))?;

        let id_column = E::id_column();
        if let ActiveValue::Set(new_id) = changes.get(id_column)
            && new_id != current.get(id_column)
        {
            log::warn!("[cathaybot-db] {} 拒绝修改主键 {}", entity, describe(id));
            return Err(CrudError::validation(entity, "identity attribute is immutable"));
        }
        // 创建时间和软删除状态只能由 create / soft_delete / restore 维护
        for column in managed_columns::<E>() {
            if is_provided(&changes, column) {
                log::warn!(
                    "[cathaybot-db] {} 拒绝直接修改 {}",
                    entity,
                    column.as_str()
                );
                return Err(CrudError::validation(
                    entity,
                    format!("`{}` cannot be changed by update", column.as_str()),
                ));
            }
        }

        let mut active = current.clone().into_active_model();
        let mut changed = false;
        for column in E::Column::iter() {
            if column.as_str() == id_column.as_str() {
                continue;
            }
            if let ActiveValue::Set(value) = changes.get(column) {
                active.set(column, value);
                changed = true;
            }
        }
        if !changed {
            return Ok(current);
        }

        if let Some(timestamps) = E::timestamp_columns() {
            active.set(timestamps.updated_at, Utc::now().into());
        }
        E::validate(&active).map_err(|message| CrudError::validation(&entity, message))?;

        active.update(db).await.map_err(CrudError::storage(operation))
    }

    async fn delete_where(&self, condition: Condition, operation: Operation) -> CrudResult<u64> {
        let txn = self.begin(operation).await?;
        let result = E::delete_many()
            .filter(condition)
            .exec(&txn)
            .await
            .map_err(CrudError::storage(operation))?;
        commit(txn, operation).await?;

        log::debug!(
            "[cathaybot-db] {} 删除 {} 条",
            entity_name::<E>(),
            result.rows_affected
        );
        Ok(result.rows_affected)
    }
}

pub(crate) async fn commit(txn: DatabaseTransaction, operation: Operation) -> CrudResult<()> {
    txn.commit().await.map_err(CrudError::storage(operation))
}

fn is_provided<A: ActiveModelTrait>(model: &A, column: <A::Entity as EntityTrait>::Column) -> bool {
    !matches!(model.get(column), ActiveValue::NotSet)
}

/// 只能由生命周期操作写入的列
pub(crate) fn managed_columns<E: Record>() -> Vec<E::Column> {
    let mut columns = Vec::new();
    if let Some(timestamps) = E::timestamp_columns() {
        columns.push(timestamps.created_at);
    }
    if let Some(soft_delete) = E::soft_delete_columns() {
        columns.push(soft_delete.deleted_flag);
        columns.push(soft_delete.deleted_at);
    }
    columns
}

/// 创建前的校验与填充：主键、必填字段、自定义校验、时间戳、软删除初始状态
fn prepare_create<E>(mut model: E::ActiveModel) -> CrudResult<E::ActiveModel>
where
    E: Record,
    E::ActiveModel: ActiveModelTrait<Entity = E>,
{
    let entity = entity_name::<E>();
    let id_column = E::id_column();

    if <E::PrimaryKey as PrimaryKeyTrait>::auto_increment() {
        if is_provided(&model, id_column) {
            return Err(CrudError::validation(
                entity,
                format!("`{}` is assigned on create", id_column.as_str()),
            ));
        }
    } else if !is_provided(&model, id_column) {
        return Err(CrudError::validation(
            entity,
            format!("missing identity attribute `{}`", id_column.as_str()),
        ));
    }

    let missing: Vec<String> = E::required_columns()
        .into_iter()
        .filter(|column| !is_provided(&model, *column))
        .map(|column| column.as_str().to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(CrudError::validation(
            entity,
            format!("missing required attributes: {}", missing.join(", ")),
        ));
    }

    E::validate(&model).map_err(|message| CrudError::validation(&entity, message))?;

    if let Some(timestamps) = E::timestamp_columns() {
        let now: Value = Utc::now().into();
        // 导入历史数据时允许显式给出创建时间
        if !is_provided(&model, timestamps.created_at) {
            model.set(timestamps.created_at, now.clone());
        }
        model.set(timestamps.updated_at, now);
    }
    if let Some(columns) = E::soft_delete_columns() {
        model.set(columns.deleted_flag, false.into());
        model.set(columns.deleted_at, Option::<chrono::DateTime<Utc>>::None.into());
    }

    Ok(model)
}
