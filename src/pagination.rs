//! 分页助手
//!
//! 提供总数、总页数、上一页 / 下一页等信息。超出范围的页码不是错误，
//! 只会得到空的 `items`，`total` 与 `total_pages` 依旧准确。

use crate::crud::Crud;
use crate::entity::{Record, entity_name};
use crate::error::{CrudError, CrudResult, Operation};
use crate::query::{Filter, apply_order, clamp_rows};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QuerySelect,
};
use serde::Serialize;

/// 分页请求，页码从 1 开始
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
    pub order_by: Option<String>,
    pub descending: bool,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            order_by: None,
            descending: false,
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    /// 按字段排序
    pub fn order_by(mut self, attribute: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(attribute.into());
        self.descending = descending;
        self
    }

    pub fn validate(&self) -> CrudResult<()> {
        if self.page < 1 || self.page_size < 1 {
            return Err(CrudError::InvalidPage {
                page: self.page,
                page_size: self.page_size,
            });
        }
        Ok(())
    }

    /// 当前页第一条记录的偏移量，超出 `u64` 时为 `None`
    pub fn offset(&self) -> Option<u64> {
        self.page.saturating_sub(1).checked_mul(self.page_size)
    }
}

/// `ceil(total / page_size)`，总数为 0 时为 0
pub fn total_pages(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// 当前页的数据
    pub items: Vec<T>,
    /// 过滤后的总记录数
    pub total: u64,
    /// 当前页码（从 1 开始）
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
    pub descending: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, page_size: u64, total: u64, descending: bool) -> Self {
        let total_pages = total_pages(total, page_size);
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
            descending,
        }
    }

    /// 转换每一项，分页元数据保持不变
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
            descending: self.descending,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 转为 JSON 对象，供 WebUI 等外部调用方直接返回
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value>
    where
        T: Serialize,
    {
        serde_json::to_value(self)
    }
}

impl<E> Crud<E>
where
    E: Record,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    /// 分页查询：先统计过滤后的总数，再取出当前页
    pub async fn paginate(&self, filter: &Filter, request: &PageRequest) -> CrudResult<Page<E::Model>> {
        request.validate()?;
        let condition = self.condition(filter)?;
        let select = apply_order(
            E::find().filter(condition.clone()),
            request.order_by.as_deref(),
            request.descending,
        )?;

        let total = E::find()
            .filter(condition)
            .count(self.connection())
            .await
            .map_err(CrudError::storage(Operation::Paginate))?;

        // 页码超出范围时不必再查询
        let offset = match request.offset() {
            Some(offset) if offset < total => offset,
            _ => {
                return Ok(Page::new(
                    Vec::new(),
                    request.page,
                    request.page_size,
                    total,
                    request.descending,
                ));
            }
        };

        let items = select
            .offset(offset)
            .limit(clamp_rows(request.page_size))
            .all(self.connection())
            .await
            .map_err(CrudError::storage(Operation::Paginate))?;

        log::debug!(
            "[cathaybot-db] {} 分页 page={} size={} total={} items={}",
            entity_name::<E>(),
            request.page,
            request.page_size,
            total,
            items.len()
        );

        Ok(Page::new(
            items,
            request.page,
            request.page_size,
            total,
            request.descending,
        ))
    }
}
