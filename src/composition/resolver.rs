//! 服务解析引擎
//!
//! 解析顺序：
//! 1. 直接注册的描述符
//! 2. 开放泛型定义封闭后的描述符
//! 3. 第一个匹配的服务源（集合、延迟、导出工厂）
//! 4. 都不匹配则返回 `None`
//!
//! 引擎只持有注册表的弱引用，容器释放后所有操作返回 `ResolverDisposed`。

use super::registry::ServiceRegistry;
use super::service_info::{ServiceDescriptor, ServiceInfo};
use super::sources::ServiceEntry;
use super::stats::ResolutionStats;
use super::types::{downcast_service, Service, TypeRef};
use crate::errors::{CompositionError, Result};
use std::any::Any;
use std::sync::{Arc, Weak};

#[derive(Clone)]
pub struct ResolverEngine {
    registry: Weak<ServiceRegistry>,
    stats: Arc<ResolutionStats>,
    trace: bool,
}

impl ResolverEngine {
    pub(crate) fn new(
        registry: &Arc<ServiceRegistry>,
        stats: Arc<ResolutionStats>,
        trace_resolution: bool,
    ) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            stats,
            trace: trace_resolution,
        }
    }

    /// 获取注册表；容器已释放时返回错误
    pub fn registry(&self) -> Result<Arc<ServiceRegistry>> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(CompositionError::ResolverDisposed)?;
        if registry.is_disposed() {
            return Err(CompositionError::ResolverDisposed);
        }
        Ok(registry)
    }

    pub(crate) fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    /// 解析服务；无法提供时返回 `Ok(None)`
    pub fn get_service(&self, contract_type: &TypeRef) -> Result<Option<Service>> {
        let registry = self.registry()?;
        self.stats.record_resolution();
        if self.trace {
            tracing::trace!(contract = %contract_type, "Resolving service");
        }

        if let Some(descriptor) = self.find_descriptor(&registry, contract_type)? {
            return descriptor.get_service(self).map(Some);
        }

        match registry.find_source(contract_type) {
            Some(source) => {
                self.stats.record_source_resolution();
                if self.trace {
                    tracing::trace!(contract = %contract_type, source = source.name(), "Resolving through service source");
                }
                source.get_service(self, contract_type).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 解析服务；无法提供时返回 `ServiceNotFound`
    pub fn get_required_service(&self, contract_type: &TypeRef) -> Result<Service> {
        self.get_service(contract_type)?
            .ok_or_else(|| CompositionError::ServiceNotFound {
                contract: contract_type.clone(),
            })
    }

    /// 列出契约的所有服务条目（描述符 + 延迟生产闭包）
    ///
    /// 多重注册按注册顺序展开；没有任何注册时返回空列表。
    pub fn get_service_entries(&self, contract_type: &TypeRef) -> Result<Vec<ServiceEntry>> {
        let registry = self.registry()?;

        if let Some(descriptor) = self.find_descriptor(&registry, contract_type)? {
            return Ok(descriptor
                .expand()
                .into_iter()
                .map(|info| self.direct_entry(info))
                .collect());
        }

        match registry.find_source(contract_type) {
            Some(source) => source.get_service_entries(self, contract_type),
            None => Ok(Vec::new()),
        }
    }

    pub fn is_registered(&self, contract_type: &TypeRef) -> Result<bool> {
        Ok(self.registry()?.is_registered(contract_type))
    }

    /// 解析并向下转型
    pub fn resolve<T: Any + Send + Sync>(&self, contract_type: &TypeRef) -> Result<Arc<T>> {
        let service = self.get_required_service(contract_type)?;
        downcast_service(service, &format!("resolving '{}'", contract_type))
    }

    pub fn try_resolve<T: Any + Send + Sync>(&self, contract_type: &TypeRef) -> Result<Option<Arc<T>>> {
        match self.get_service(contract_type)? {
            Some(service) => {
                downcast_service(service, &format!("resolving '{}'", contract_type)).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 按注册顺序解析全部实现
    pub fn resolve_all<T: Any + Send + Sync>(&self, contract_type: &TypeRef) -> Result<Vec<Arc<T>>> {
        let context = format!("resolving all '{}'", contract_type);
        self.get_service_entries(contract_type)?
            .iter()
            .map(|entry| downcast_service(entry.create()?, &context))
            .collect()
    }

    fn find_descriptor(
        &self,
        registry: &ServiceRegistry,
        contract_type: &TypeRef,
    ) -> Result<Option<Arc<dyn ServiceDescriptor>>> {
        if let Some(descriptor) = registry.try_get(contract_type) {
            return Ok(Some(descriptor));
        }
        match registry.close_generic(contract_type)? {
            Some((descriptor, created)) => {
                if created {
                    self.stats.record_generic_closing();
                }
                Ok(Some(descriptor))
            }
            None => Ok(None),
        }
    }

    /// 条目可能比容器活得久（被 `Lazy` / `ExportFactory` 捕获），生产前重新检查注册表
    fn direct_entry(&self, info: Arc<ServiceInfo>) -> ServiceEntry {
        let engine = self.clone();
        let target = info.clone();
        ServiceEntry::new(
            info,
            Arc::new(move || {
                engine.registry()?;
                target.get_service(&engine)
            }),
        )
    }
}

impl std::fmt::Debug for ResolverEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverEngine")
            .field("alive", &(self.registry.strong_count() > 0))
            .field("trace", &self.trace)
            .finish()
    }
}
