//! 延迟服务源：`Lazy<T>` 与 `Lazy<T, M>`

use super::{wrap_entries, ServiceEntry, ServiceSource, ServiceThunk};
use crate::composition::cycle::ProductionGuard;
use crate::composition::resolver::ResolverEngine;
use crate::composition::service_info::next_descriptor_id;
use crate::composition::types::{downcast_service, well_known, Service, TypeRef};
use crate::errors::{CompositionError, Result};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 延迟服务：首次访问 [`value`](LazyService::value) 时才创建，之后复用
pub struct LazyService {
    id: u64,
    contract_type: TypeRef,
    factory: ServiceThunk,
    value: RwLock<Option<Service>>,
    creation_lock: Mutex<()>,
    metadata: Option<Service>,
}

impl LazyService {
    pub fn new(service_type: TypeRef, factory: ServiceThunk) -> Self {
        Self::from_parts(TypeRef::lazy(service_type), factory, None)
    }

    pub(crate) fn from_parts(
        contract_type: TypeRef,
        factory: ServiceThunk,
        metadata: Option<Service>,
    ) -> Self {
        Self {
            id: next_descriptor_id(),
            contract_type,
            factory,
            value: RwLock::new(None),
            creation_lock: Mutex::new(()),
            metadata,
        }
    }

    /// 获取（必要时创建）服务；创建失败时不缓存，下次访问重试
    ///
    /// 创建过程中在同一线程再次访问同一个延迟服务会返回 `CircularDependency`。
    pub fn value(&self) -> Result<Service> {
        if let Some(value) = self.value.read().as_ref() {
            return Ok(value.clone());
        }

        // 与单例一样先标记再加锁
        let _guard = ProductionGuard::enter(self.id, &self.contract_type)?;
        let _creation = self.creation_lock.lock();
        if let Some(value) = self.value.read().as_ref() {
            return Ok(value.clone());
        }

        let value = (self.factory)()?;
        *self.value.write() = Some(value.clone());
        Ok(value)
    }

    pub fn value_as<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        downcast_service(self.value()?, "lazy value")
    }

    pub fn is_value_created(&self) -> bool {
        self.value.read().is_some()
    }

    pub fn metadata(&self) -> Option<&Service> {
        self.metadata.as_ref()
    }

    pub fn metadata_as<M: Any + Send + Sync>(&self) -> Result<Arc<M>> {
        let metadata = self.metadata.clone().ok_or_else(|| {
            CompositionError::NotSupported("lazy service was resolved without metadata".to_string())
        })?;
        downcast_service(metadata, "lazy metadata")
    }
}

impl fmt::Debug for LazyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyService")
            .field("contract_type", &self.contract_type)
            .field("is_value_created", &self.is_value_created())
            .field("has_metadata", &self.metadata.is_some())
            .finish()
    }
}

/// `Lazy<T>`
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyServiceSource;

impl ServiceSource for LazyServiceSource {
    fn name(&self) -> &'static str {
        "lazy"
    }

    fn is_match(&self, contract_type: &TypeRef) -> bool {
        contract_type.is_shape(well_known::LAZY, 1)
    }

    fn get_service_entries(
        &self,
        engine: &ResolverEngine,
        contract_type: &TypeRef,
    ) -> Result<Vec<ServiceEntry>> {
        let lazy_type = contract_type.clone();
        wrap_entries(engine, contract_type, move |factory, metadata| {
            LazyService::from_parts(lazy_type.clone(), factory, metadata)
        })
    }
}

/// `Lazy<T, M>`
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyWithMetadataServiceSource;

impl ServiceSource for LazyWithMetadataServiceSource {
    fn name(&self) -> &'static str {
        "lazy_with_metadata"
    }

    fn is_match(&self, contract_type: &TypeRef) -> bool {
        contract_type.is_shape(well_known::LAZY, 2)
    }

    fn get_service_entries(
        &self,
        engine: &ResolverEngine,
        contract_type: &TypeRef,
    ) -> Result<Vec<ServiceEntry>> {
        let lazy_type = contract_type.clone();
        wrap_entries(engine, contract_type, move |factory, metadata| {
            LazyService::from_parts(lazy_type.clone(), factory, metadata)
        })
    }
}
