//! 查询构建器
//!
//! [`Filter`] 是不可变的值：每次链式调用都会返回一个新的过滤器，
//! 因此同一个过滤器可以在多次查询、多个任务之间放心复用。
//! 字段名在执行时才会对照实体校验，构建阶段只是纯数据。
//!
//! ```ignore
//! let filter = Filter::new()
//!     .eq("status", "active")
//!     .like("username", "%admin%")
//!     .in_set("role", ["admin", "moderator"])
//!     .between("age", 18, 60)
//!     .or([
//!         Filter::new().eq("role", "admin"),
//!         Filter::new().gte("score", 100),
//!     ]);
//! ```

use crate::entity::{Record, resolve_column};
use crate::error::CrudResult;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ColumnTrait, Condition, EntityTrait, IdenStatic, QueryOrder, Select, Value};

/// 单个过滤条件，字段以名称引用
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    /// 区分大小写的 LIKE，`%` 通配符原样透传
    Like(String, String),
    /// 不区分大小写的 LIKE
    ILike(String, String),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    /// 闭区间 `low <= attr <= high`
    Between(String, Value, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    IsNull(String),
    IsNotNull(String),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// 对照实体 `E` 编译为 sea-orm 条件
    pub fn compile<E: EntityTrait>(&self) -> CrudResult<Condition> {
        let condition = match self {
            Self::Eq(attr, value) => leaf(column::<E>(attr)?.eq(value.clone())),
            Self::Ne(attr, value) => leaf(column::<E>(attr)?.ne(value.clone())),
            Self::Like(attr, pattern) => leaf(column::<E>(attr)?.like(pattern.as_str())),
            Self::ILike(attr, pattern) => {
                let col = column::<E>(attr)?;
                leaf(Expr::expr(Func::lower(Expr::col(col))).like(pattern.to_lowercase()))
            }
            Self::In(attr, values) => {
                let col = column::<E>(attr)?;
                if values.is_empty() {
                    never()
                } else {
                    leaf(col.is_in(values.iter().cloned()))
                }
            }
            Self::NotIn(attr, values) => {
                let col = column::<E>(attr)?;
                if values.is_empty() {
                    Condition::all()
                } else {
                    leaf(col.is_not_in(values.iter().cloned()))
                }
            }
            Self::Between(attr, low, high) => {
                leaf(column::<E>(attr)?.between(low.clone(), high.clone()))
            }
            Self::Gt(attr, value) => leaf(column::<E>(attr)?.gt(value.clone())),
            Self::Gte(attr, value) => leaf(column::<E>(attr)?.gte(value.clone())),
            Self::Lt(attr, value) => leaf(column::<E>(attr)?.lt(value.clone())),
            Self::Lte(attr, value) => leaf(column::<E>(attr)?.lte(value.clone())),
            Self::IsNull(attr) => leaf(column::<E>(attr)?.is_null()),
            Self::IsNotNull(attr) => leaf(column::<E>(attr)?.is_not_null()),
            Self::All(parts) => {
                let mut condition = Condition::all();
                for part in parts {
                    condition = condition.add(part.compile::<E>()?);
                }
                condition
            }
            Self::Any(parts) => {
                if parts.is_empty() {
                    return Ok(never());
                }
                let mut condition = Condition::any();
                for part in parts {
                    condition = condition.add(part.compile::<E>()?);
                }
                condition
            }
            Self::Not(inner) => inner.compile::<E>()?.not(),
        };
        Ok(condition)
    }
}

fn column<E: EntityTrait>(attribute: &str) -> CrudResult<E::Column> {
    resolve_column::<E>(attribute)
}

fn leaf(expr: sea_orm::sea_query::SimpleExpr) -> Condition {
    Condition::all().add(expr)
}

/// 恒假条件：空 IN、空 OR
fn never() -> Condition {
    Condition::all().add(Expr::val(1).eq(0))
}

/// 过滤条件构建器，内部条件默认以 AND 组合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加任意条件
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.clauses.push(predicate);
        self
    }

    /// 等值条件 `attr = value`
    pub fn eq(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::Eq(attribute.into(), value.into()))
    }

    /// 一次添加多个等值条件，彼此 AND
    pub fn eq_all<K, V, I>(self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .fold(self, |filter, (attribute, value)| filter.eq(attribute, value))
    }

    /// 不等条件 `attr != value`
    pub fn ne(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::Ne(attribute.into(), value.into()))
    }

    /// LIKE 模糊匹配，`%` 不做转义，需要时由调用方自行处理
    pub fn like(self, attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(Predicate::Like(attribute.into(), pattern.into()))
    }

    pub fn ilike(self, attribute: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(Predicate::ILike(attribute.into(), pattern.into()))
    }

    /// IN 条件，空集合不匹配任何记录
    pub fn in_set<V, I>(self, attribute: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.with(Predicate::In(attribute.into(), values))
    }

    /// NOT IN 条件，空集合匹配全部记录
    pub fn not_in<V, I>(self, attribute: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.with(Predicate::NotIn(attribute.into(), values))
    }

    /// 闭区间范围条件
    pub fn between(
        self,
        attribute: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.with(Predicate::Between(attribute.into(), low.into(), high.into()))
    }

    pub fn gt(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::Gt(attribute.into(), value.into()))
    }

    pub fn gte(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::Gte(attribute.into(), value.into()))
    }

    pub fn lt(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::Lt(attribute.into(), value.into()))
    }

    pub fn lte(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(Predicate::Lte(attribute.into(), value.into()))
    }

    pub fn is_null(self, attribute: impl Into<String>) -> Self {
        self.with(Predicate::IsNull(attribute.into()))
    }

    pub fn is_not_null(self, attribute: impl Into<String>) -> Self {
        self.with(Predicate::IsNotNull(attribute.into()))
    }

    /// 显式 AND 组：各子过滤器的全部条件都必须满足
    pub fn and(self, groups: impl IntoIterator<Item = Filter>) -> Self {
        let parts = groups.into_iter().map(|group| group.predicate()).collect();
        self.with(Predicate::All(parts))
    }

    /// OR 组：每个子过滤器内部 AND，组与组之间 OR；没有任何组时不匹配
    pub fn or(self, groups: impl IntoIterator<Item = Filter>) -> Self {
        let parts = groups.into_iter().map(|group| group.predicate()).collect();
        self.with(Predicate::Any(parts))
    }

    /// 对子过滤器的完整条件取反
    pub fn not(self, group: Filter) -> Self {
        self.with(Predicate::Not(Box::new(group.predicate())))
    }

    /// 累积条件的合取
    pub fn predicate(&self) -> Predicate {
        Predicate::All(self.clauses.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Predicate] {
        &self.clauses
    }

    /// 对照实体 `E` 编译，未声明的字段在这里报 `InvalidAttribute`
    pub fn to_condition<E: EntityTrait>(&self) -> CrudResult<Condition> {
        self.predicate().compile::<E>()
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Filter::new().with(predicate)
    }
}

/// 单次查询的最大偏移量 / 行数，驱动按 `i64` 绑定
pub(crate) const MAX_ROWS: u64 = i64::MAX as u64;

pub(crate) fn clamp_rows(rows: u64) -> u64 {
    rows.min(MAX_ROWS)
}

/// 应用排序；未指定字段时按主键排序，保证单次调用内顺序稳定
pub(crate) fn apply_order<E: Record>(
    select: Select<E>,
    order_by: Option<&str>,
    descending: bool,
) -> CrudResult<Select<E>> {
    let id = E::id_column();
    let column = match order_by {
        Some(attribute) => resolve_column::<E>(attribute)?,
        None => id,
    };

    let select = if descending {
        select.order_by_desc(column)
    } else {
        select.order_by_asc(column)
    };

    // 非主键排序时以主键作为次序，相同值的记录也有确定顺序
    if column.as_str() != id.as_str() {
        Ok(select.order_by_asc(id))
    } else {
        Ok(select)
    }
}
