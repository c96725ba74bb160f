//! 组合容器
//!
//! 容器拥有服务注册表，按配置安装默认服务源，并向外提供解析引擎。
//! 解析引擎只持有注册表的弱引用：容器释放后引擎的所有操作返回
//! [`CompositionError::ResolverDisposed`](crate::errors::CompositionError::ResolverDisposed)。

use super::registry::ServiceRegistry;
use super::resolver::ResolverEngine;
use super::service_info::ServiceInfo;
use super::stats::{ContainerStats, ResolutionStats};
use super::types::{Service, TypeRef};
use crate::config::CompositionConfig;
use crate::errors::Result;
use std::any::Any;
use std::sync::Arc;

pub struct CompositionContainer {
    registry: Arc<ServiceRegistry>,
    stats: Arc<ResolutionStats>,
    config: CompositionConfig,
}

impl CompositionContainer {
    /// 使用默认配置创建容器（安装全部服务源）
    pub fn new() -> Self {
        Self::with_config(CompositionConfig::default())
    }

    pub fn with_config(config: CompositionConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        for kind in &config.default_sources {
            registry.register_shared_source(kind.create());
        }

        tracing::debug!(
            sources = config.default_sources.len(),
            trace_resolution = config.trace_resolution,
            "Composition container created"
        );

        Self {
            registry,
            stats: Arc::new(ResolutionStats::default()),
            config,
        }
    }

    /// 注册表（用于注册服务与服务源）
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    pub fn register_service(&self, info: impl Into<Arc<ServiceInfo>>) -> Result<&Self> {
        self.registry.register_service(info)?;
        Ok(self)
    }

    /// 创建解析引擎；所有引擎共享容器的统计信息
    pub fn resolver(&self) -> ResolverEngine {
        ResolverEngine::new(&self.registry, self.stats.clone(), self.config.trace_resolution)
    }

    /// 解析必需服务
    pub fn get_export(&self, contract_type: &TypeRef) -> Result<Service> {
        self.resolver().get_required_service(contract_type)
    }

    /// 解析服务；无法提供时返回 `Ok(None)`
    pub fn try_get_export(&self, contract_type: &TypeRef) -> Result<Option<Service>> {
        self.resolver().get_service(contract_type)
    }

    /// 按注册顺序解析契约的全部实现
    pub fn get_exports(&self, contract_type: &TypeRef) -> Result<Vec<Service>> {
        self.resolver()
            .get_service_entries(contract_type)?
            .iter()
            .map(|entry| entry.create())
            .collect()
    }

    pub fn resolve<T: Any + Send + Sync>(&self, contract_type: &TypeRef) -> Result<Arc<T>> {
        self.resolver().resolve(contract_type)
    }

    pub fn try_resolve<T: Any + Send + Sync>(&self, contract_type: &TypeRef) -> Result<Option<Arc<T>>> {
        self.resolver().try_resolve(contract_type)
    }

    pub fn resolve_all<T: Any + Send + Sync>(&self, contract_type: &TypeRef) -> Result<Vec<Arc<T>>> {
        self.resolver().resolve_all(contract_type)
    }

    pub fn is_registered(&self, contract_type: &TypeRef) -> bool {
        self.registry.is_registered(contract_type)
    }

    pub fn stats(&self) -> ContainerStats {
        self.stats.snapshot(self.registry.len())
    }

    /// 释放容器持有的实例；之后的解析全部失败
    pub fn dispose(&self) {
        if !self.registry.is_disposed() {
            tracing::debug!("{}", self.stats().performance_summary());
        }
        self.registry.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }
}

impl Default for CompositionContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CompositionContainer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CompositionContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionContainer")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
