//! 多重服务描述符：同一契约下允许多个实现的注册集合

use super::service_info::{next_descriptor_id, ServiceDescriptor, ServiceInfo, ServiceLifetime};
use super::resolver::ResolverEngine;
use super::types::{Service, TypeRef};
use crate::errors::{CompositionError, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub struct MultiServiceInfo {
    id: u64,
    contract_type: TypeRef,
    services: RwLock<Vec<Arc<ServiceInfo>>>,
}

impl MultiServiceInfo {
    pub(crate) fn new(first: Arc<ServiceInfo>) -> Self {
        let contract_type = first.contract_type().clone();
        Self::from_services(contract_type, vec![first])
    }

    pub(crate) fn from_services(contract_type: TypeRef, services: Vec<Arc<ServiceInfo>>) -> Self {
        Self {
            id: next_descriptor_id(),
            contract_type,
            services: RwLock::new(services),
        }
    }

    /// 追加一个实现，保持注册顺序
    pub(crate) fn add(&self, info: Arc<ServiceInfo>) {
        self.services.write().push(info);
    }

    pub fn services(&self) -> Vec<Arc<ServiceInfo>> {
        self.services.read().clone()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl ServiceDescriptor for MultiServiceInfo {
    fn id(&self) -> u64 {
        self.id
    }

    fn contract_type(&self) -> &TypeRef {
        &self.contract_type
    }

    fn service_type(&self) -> &TypeRef {
        &self.contract_type
    }

    fn instance_type(&self) -> Option<&TypeRef> {
        None
    }

    fn lifetime(&self) -> ServiceLifetime {
        self.services
            .read()
            .first()
            .map(|info| info.lifetime())
            .unwrap_or(ServiceLifetime::Transient)
    }

    fn allows_multiple(&self) -> bool {
        true
    }

    fn is_externally_owned(&self) -> bool {
        false
    }

    /// 直接解析多重注册的契约没有唯一答案，应改为解析 `Enumerable<T>`
    fn get_service(&self, _engine: &ResolverEngine) -> Result<Service> {
        Err(CompositionError::NotSupported(format!(
            "'{}' has {} implementations registered; resolve {} instead",
            self.contract_type,
            self.len(),
            TypeRef::enumerable(self.contract_type.clone())
        )))
    }

    fn make_generic(&self, type_args: &[TypeRef]) -> Result<Arc<dyn ServiceDescriptor>> {
        let contract_type = self.contract_type.make_generic(type_args)?;
        let closed = self
            .services()
            .iter()
            .map(|info| info.make_generic_service_info(type_args).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(MultiServiceInfo::from_services(contract_type, closed)))
    }

    fn expand(self: Arc<Self>) -> Vec<Arc<ServiceInfo>> {
        self.services()
    }

    fn as_multi(&self) -> Option<&MultiServiceInfo> {
        Some(self)
    }

    fn dispose(&self) {
        for info in self.services() {
            info.dispose();
        }
    }
}

impl fmt::Debug for MultiServiceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiServiceInfo")
            .field("id", &self.id)
            .field("contract_type", &self.contract_type)
            .field("services", &self.len())
            .finish()
    }
}
