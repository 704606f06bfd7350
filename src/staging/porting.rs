//! 移植：把元阶段聚合值降为对象阶段初始化列表
//!
//! 聚合值先被复制进只追加的 [`AggregateArena`]，移植器按下标逐个槽位
//! 生成字面量子表达式，因此结果与元阶段的源值之间不存在任何别名。

use super::error::StageError;
use crate::frontend::types::TypeDesc;
use crate::middle::{Literal, ObjExpr};
use crate::runtime::Value;
use crate::util::span::Span;

/// 只追加的聚合值存储区
#[derive(Debug, Default)]
pub struct AggregateArena {
    slots: Vec<Value>,
}

/// 已捕获、只读的元阶段序列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortableAggregate {
    start: usize,
    len: usize,
}

impl PortableAggregate {
    /// 元素个数
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AggregateArena {
    /// 创建空存储区
    pub fn new() -> Self {
        Self::default()
    }

    /// 复制序列的元素，返回其句柄
    pub fn capture(
        &mut self,
        items: &[Value],
    ) -> PortableAggregate {
        let start = self.slots.len();
        self.slots.extend(items.iter().cloned());
        PortableAggregate {
            start,
            len: items.len(),
        }
    }

    /// 按下标读取槽位
    #[inline]
    pub fn slot(
        &self,
        aggregate: &PortableAggregate,
        index: usize,
    ) -> Option<&Value> {
        if index < aggregate.len {
            self.slots.get(aggregate.start + index)
        } else {
            None
        }
    }

    /// 已占用的槽位总数
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// 移植器
#[derive(Debug, Default)]
pub struct PortingTranslator {
    arena: AggregateArena,
}

impl PortingTranslator {
    /// 创建移植器
    pub fn new() -> Self {
        Self::default()
    }

    /// 底层存储区
    pub fn arena(&self) -> &AggregateArena {
        &self.arena
    }

    /// 移植一个元阶段值
    ///
    /// 序列变为初始化列表；字面量值原样嵌入。元素类型必须是字面量类型，
    /// 检查在生成任何代码之前完成，失败时不产生部分结果。
    pub fn port(
        &mut self,
        value: &Value,
        span: Span,
    ) -> Result<ObjExpr, StageError> {
        let (elem, items) = match value {
            Value::Vec { elem, items } => (elem, items),
            literal => return embed_literal(literal, span),
        };

        if !elem.is_literal() {
            return Err(non_literal(elem, span));
        }
        if let Some(bad) = items.iter().find(|item| !item.is_literal()) {
            return Err(non_literal(&bad.type_desc(), span));
        }

        let aggregate = self.arena.capture(items);
        tracing::debug!(
            "porting {} element(s) of type {} (arena slots {})",
            aggregate.len(),
            elem,
            self.arena.len()
        );

        let mut lowered = Vec::with_capacity(aggregate.len());
        for index in 0..aggregate.len() {
            if let Some(slot) = self.arena.slot(&aggregate, index) {
                lowered.push(embed_literal(slot, span)?);
            }
        }
        Ok(ObjExpr::List {
            elem: elem.clone(),
            items: lowered,
        })
    }
}

/// 把字面量值直接替换进对象阶段代码
pub fn embed_literal(
    value: &Value,
    span: Span,
) -> Result<ObjExpr, StageError> {
    Literal::from_value(value)
        .map(ObjExpr::Lit)
        .ok_or_else(|| non_literal(&value.type_desc(), span))
}

fn non_literal(
    ty: &TypeDesc,
    span: Span,
) -> StageError {
    StageError::NonLiteralPortError {
        ty: ty.to_string(),
        span,
    }
}
