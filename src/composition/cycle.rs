//! 循环依赖检测
//!
//! 每个线程维护一个"正在生产"的描述符栈。生产前压栈、守卫释放时出栈，
//! 同一线程内重入同一描述符即为循环依赖。不同线程并发生产同一单例不是
//! 循环，由描述符上的锁串行化。

use super::types::TypeRef;
use crate::errors::{CompositionError, Result};
use std::cell::RefCell;

thread_local! {
    static IN_PRODUCTION: RefCell<Vec<(u64, TypeRef)>> = const { RefCell::new(Vec::new()) };
}

/// 生产标记守卫，drop 时出栈（包括出错与 panic 展开）
#[must_use = "the production marker is released as soon as the guard is dropped"]
pub(crate) struct ProductionGuard {
    id: u64,
}

impl ProductionGuard {
    /// 标记描述符进入生产；若当前线程已在生产该描述符则返回循环依赖错误
    pub(crate) fn enter(id: u64, contract: &TypeRef) -> Result<Self> {
        IN_PRODUCTION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|(active, _)| *active == id) {
                let chain = stack[start..]
                    .iter()
                    .map(|(_, contract)| contract.to_string())
                    .chain(std::iter::once(contract.to_string()))
                    .collect();
                return Err(CompositionError::CircularDependency {
                    contract: contract.clone(),
                    chain,
                });
            }
            stack.push((id, contract.clone()));
            Ok(ProductionGuard { id })
        })
    }
}

impl Drop for ProductionGuard {
    fn drop(&mut self) {
        // 线程销毁期间 TLS 可能已不可用
        let _ = IN_PRODUCTION.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|(active, _)| *active == self.id) {
                stack.remove(position);
            }
        });
    }
}

/// 当前线程正在生产的描述符数量
#[cfg(test)]
pub(crate) fn production_depth() -> usize {
    IN_PRODUCTION.with(|stack| stack.borrow().len())
}
