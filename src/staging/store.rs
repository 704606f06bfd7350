//! 元阶段存储
//!
//! 保存所有元阶段变量绑定。存储的生命周期与整个翻译单元相同：
//! 翻译开始时创建，每条执行的元语句原地修改，翻译结束时才销毁。
//! 没有快照，也没有回滚。

use super::value::{StageValue, StageValueView};
use crate::runtime::Value;
use indexmap::IndexMap;
use std::fmt;

/// 元变量标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaVarId(pub u32);

impl fmt::Display for MetaVarId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    value: StageValue,
}

/// 元阶段存储
///
/// 单一所有者，按引用显式传入每一次元阶段求值。
#[derive(Debug, Default)]
pub struct StageStore {
    /// 按声明顺序分配的槽位
    slots: Vec<Slot>,
    /// 文件作用域元变量
    globals: IndexMap<String, MetaVarId>,
}

impl StageStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 为局部元变量分配新槽位
    pub fn declare(
        &mut self,
        name: &str,
        value: StageValue,
    ) -> MetaVarId {
        let id = MetaVarId(self.slots.len() as u32);
        tracing::trace!("declare meta {} {} = {}", id, name, value.value);
        self.slots.push(Slot {
            name: name.to_string(),
            value,
        });
        id
    }

    /// 声明文件作用域元变量；重名时返回 `None`
    pub fn declare_global(
        &mut self,
        name: &str,
        value: StageValue,
    ) -> Option<MetaVarId> {
        if self.globals.contains_key(name) {
            return None;
        }
        let id = self.declare(name, value);
        self.globals.insert(name.to_string(), id);
        Some(id)
    }

    /// 按名称查找文件作用域元变量
    #[inline]
    pub fn global(
        &self,
        name: &str,
    ) -> Option<MetaVarId> {
        self.globals.get(name).copied()
    }

    /// 读取当前值
    #[inline]
    pub fn read(
        &self,
        id: MetaVarId,
    ) -> Option<&StageValue> {
        self.slots.get(id.0 as usize).map(|slot| &slot.value)
    }

    /// 原地写入；标识不存在时返回 `false`
    pub fn write(
        &mut self,
        id: MetaVarId,
        value: StageValue,
    ) -> bool {
        match self.slots.get_mut(id.0 as usize) {
            Some(slot) => {
                tracing::trace!("write meta {} {} = {}", id, slot.name, value.value);
                slot.value = value;
                true
            }
            None => false,
        }
    }

    /// 可变访问，用于 `push` 等原地修改
    #[inline]
    pub fn value_mut(
        &mut self,
        id: MetaVarId,
    ) -> Option<&mut Value> {
        self.slots
            .get_mut(id.0 as usize)
            .map(|slot| &mut slot.value.value)
    }

    /// 修改后刷新类型描述（空序列首次 `push` 后元素类型才确定）
    pub fn refresh_type(
        &mut self,
        id: MetaVarId,
    ) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            slot.value.ty = slot.value.value.type_desc();
        }
    }

    /// 槽位数量
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 文件作用域元变量及其当前值，按声明顺序
    pub fn globals(&self) -> impl Iterator<Item = (&str, &StageValue)> + '_ {
        self.globals
            .iter()
            .filter_map(|(name, id)| self.read(*id).map(|v| (name.as_str(), v)))
    }

    /// 可序列化的全局视图
    pub fn snapshot(&self) -> IndexMap<String, StageValueView> {
        self.globals()
            .map(|(name, value)| (name.to_string(), StageValueView::from(value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_is_visible_to_later_reads() {
        let mut store = StageStore::new();
        let j = store
            .declare_global("j", StageValue::meta(Value::Int(0)))
            .unwrap();
        for expected in 1..=3 {
            let next = store.read(j).unwrap().value.as_int().unwrap() + 1;
            assert!(store.write(j, StageValue::meta(Value::Int(next))));
            assert_eq!(store.read(j).unwrap().value, Value::Int(expected));
        }
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut store = StageStore::new();
        assert!(store.read(MetaVarId(7)).is_none());
        assert!(!store.write(MetaVarId(7), StageValue::meta(Value::Unit)));
    }

    #[test]
    fn test_duplicate_global_is_rejected() {
        let mut store = StageStore::new();
        assert!(store
            .declare_global("x", StageValue::meta(Value::Int(1)))
            .is_some());
        assert!(store
            .declare_global("x", StageValue::meta(Value::Int(2)))
            .is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_locals_get_fresh_slots_and_are_not_global() {
        let mut store = StageStore::new();
        let a = store.declare("k", StageValue::meta(Value::Int(1)));
        let b = store.declare("k", StageValue::meta(Value::Int(2)));
        assert_ne!(a, b);
        assert!(store.global("k").is_none());
        assert_eq!(store.snapshot().len(), 0);
    }
}
