//! 服务注册表
//!
//! 契约 → 描述符的并发映射，外加开放泛型的封闭缓存、服务源列表与类型目录。
//! 注册表只负责存取，实例生产由 [`ResolverEngine`](super::resolver::ResolverEngine) 驱动。

use super::multi_service_info::MultiServiceInfo;
use super::reflection::{TypeCatalog, TypeInfo};
use super::resolver::ResolverEngine;
use super::service_info::{ServiceDescriptor, ServiceInfo, ServiceLifetime};
use super::sources::ServiceSource;
use super::types::{Service, TypeRef};
use crate::errors::{CompositionError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct ServiceRegistry {
    services: DashMap<TypeRef, Arc<dyn ServiceDescriptor>>,
    /// 顶层契约的首次注册顺序
    registration_order: RwLock<Vec<TypeRef>>,
    closed_generics: DashMap<TypeRef, Arc<dyn ServiceDescriptor>>,
    sources: RwLock<Vec<Arc<dyn ServiceSource>>>,
    types: TypeCatalog,
    disposed: AtomicBool,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            registration_order: RwLock::new(Vec::new()),
            closed_generics: DashMap::new(),
            sources: RwLock::new(Vec::new()),
            types: TypeCatalog::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// 注册服务描述符
    ///
    /// - 契约未注册：直接加入（允许多重时包装为多重描述符）
    /// - 已是多重注册：新描述符也必须允许多重，追加到末尾
    /// - 已是单一注册：新描述符也必须是单一的，后注册者覆盖
    pub fn register_service(&self, info: impl Into<Arc<ServiceInfo>>) -> Result<&Self> {
        let info: Arc<ServiceInfo> = info.into();
        let contract = info.contract_type().clone();

        if let Some(implementation) = info.implementation_info() {
            self.types.register(implementation.clone());
        }

        let mut added = false;
        let mut replaced: Vec<Arc<dyn ServiceDescriptor>> = Vec::new();
        match self.services.entry(contract.clone()) {
            Entry::Occupied(mut entry) => {
                let existing_is_multi = entry.get().as_multi().is_some();
                match (existing_is_multi, info.allows_multiple()) {
                    (true, true) => {
                        if let Some(multi) = entry.get().as_multi() {
                            multi.add(info);
                        }
                    }
                    (false, true) => {
                        return Err(CompositionError::AlreadyRegisteredAsSingle { contract });
                    }
                    (true, false) => {
                        return Err(CompositionError::AlreadyRegisteredAsMultiple { contract });
                    }
                    (false, false) => {
                        tracing::warn!(contract = %contract, "Overriding existing service registration");
                        replaced.push(entry.insert(info));
                    }
                }
            }
            Entry::Vacant(entry) => {
                let descriptor: Arc<dyn ServiceDescriptor> = if info.allows_multiple() {
                    Arc::new(MultiServiceInfo::new(info))
                } else {
                    info
                };
                entry.insert(descriptor);
                added = true;
            }
        }

        if added {
            self.registration_order.write().push(contract.clone());
        }
        if contract.is_generic_definition() {
            // 开放泛型的注册变化后，已封闭的结果不再可信
            self.closed_generics.retain(|closed, descriptor| {
                let stale = closed.generic_definition().as_ref() == Some(&contract);
                if stale {
                    replaced.push(descriptor.clone());
                }
                !stale
            });
        }

        // 被替换的描述符可能已经生产过单例，释放时不持有任何映射锁
        for descriptor in replaced {
            descriptor.dispose();
        }

        tracing::debug!(contract = %contract, "Registered service");
        Ok(self)
    }

    /// 注册现成实例（单例）
    pub fn register_instance<T: Any + Send + Sync>(
        &self,
        contract_type: TypeRef,
        instance: T,
    ) -> Result<&Self> {
        self.register_service(ServiceInfo::from_instance(contract_type, instance))
    }

    /// 以实现类型注册单例
    pub fn register_singleton(
        &self,
        contract_type: TypeRef,
        implementation: impl Into<Arc<TypeInfo>>,
    ) -> Result<&Self> {
        self.register_service(ServiceInfo::from_type(
            contract_type,
            implementation,
            ServiceLifetime::Singleton,
        ))
    }

    /// 以实现类型注册瞬态服务
    pub fn register_transient(
        &self,
        contract_type: TypeRef,
        implementation: impl Into<Arc<TypeInfo>>,
    ) -> Result<&Self> {
        self.register_service(ServiceInfo::from_type(
            contract_type,
            implementation,
            ServiceLifetime::Transient,
        ))
    }

    /// 以工厂闭包注册
    pub fn register_factory<F>(
        &self,
        contract_type: TypeRef,
        lifetime: ServiceLifetime,
        factory: F,
    ) -> Result<&Self>
    where
        F: Fn(&ResolverEngine) -> Result<Service> + Send + Sync + 'static,
    {
        self.register_service(ServiceInfo::from_factory(contract_type, lifetime, factory))
    }

    /// 追加服务源；按注册顺序匹配
    pub fn register_source<S: ServiceSource + 'static>(&self, source: S) -> &Self {
        self.register_shared_source(Arc::new(source))
    }

    pub fn register_shared_source(&self, source: Arc<dyn ServiceSource>) -> &Self {
        tracing::debug!(source = source.name(), "Registered service source");
        self.sources.write().push(source);
        self
    }

    /// 声明类型信息（例如元数据视图类型）
    pub fn register_type_info(&self, info: impl Into<Arc<TypeInfo>>) -> Arc<TypeInfo> {
        self.types.register(info.into())
    }

    pub fn type_info(&self, type_ref: &TypeRef) -> Option<Arc<TypeInfo>> {
        self.types.get(type_ref)
    }

    pub fn types(&self) -> &TypeCatalog {
        &self.types
    }

    /// 直接注册、开放泛型定义或服务源之一能够提供该契约
    pub fn is_registered(&self, contract_type: &TypeRef) -> bool {
        if self.services.contains_key(contract_type) {
            return true;
        }
        if let Some(definition) = contract_type.generic_definition() {
            if self.services.contains_key(&definition) {
                return true;
            }
        }
        self.find_source(contract_type).is_some()
    }

    /// 按契约直接查找描述符
    pub fn try_get(&self, contract_type: &TypeRef) -> Option<Arc<dyn ServiceDescriptor>> {
        self.services
            .get(contract_type)
            .map(|descriptor| descriptor.value().clone())
    }

    /// 封闭开放泛型注册；每个封闭契约只封闭一次
    ///
    /// 返回描述符以及本次调用是否新建了封闭结果。
    pub(crate) fn close_generic(
        &self,
        contract_type: &TypeRef,
    ) -> Result<Option<(Arc<dyn ServiceDescriptor>, bool)>> {
        if let Some(closed) = self.closed_generics.get(contract_type) {
            return Ok(Some((closed.value().clone(), false)));
        }

        let definition = match contract_type.generic_definition() {
            Some(definition) => definition,
            None => return Ok(None),
        };
        let template = match self.try_get(&definition) {
            Some(template) => template,
            None => return Ok(None),
        };

        let (closed, created) = match self.closed_generics.entry(contract_type.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let closed = template.make_generic(contract_type.type_args())?;
                entry.insert(closed.clone());
                (closed, true)
            }
        };

        if created {
            for info in closed.clone().expand() {
                if let Some(implementation) = info.implementation_info() {
                    self.types.register(implementation.clone());
                }
            }
            tracing::debug!(contract = %contract_type, definition = %definition, "Closed open generic registration");
        }

        Ok(Some((closed, created)))
    }

    /// 第一个匹配该契约的服务源
    pub fn find_source(&self, contract_type: &TypeRef) -> Option<Arc<dyn ServiceSource>> {
        self.sources
            .read()
            .iter()
            .find(|source| source.is_match(contract_type))
            .cloned()
    }

    pub fn sources(&self) -> Vec<Arc<dyn ServiceSource>> {
        self.sources.read().clone()
    }

    /// 按首次注册顺序返回顶层描述符
    pub fn descriptors(&self) -> Vec<Arc<dyn ServiceDescriptor>> {
        let order = self.registration_order.read().clone();
        order
            .iter()
            .filter_map(|contract| self.try_get(contract))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// 释放所有已创建的实例；重复调用无效果
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut descriptors: Vec<Arc<dyn ServiceDescriptor>> = self
            .closed_generics
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        descriptors.extend(self.descriptors());

        for descriptor in &descriptors {
            descriptor.dispose();
        }
        self.closed_generics.clear();

        tracing::info!(services = descriptors.len(), "Service registry disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.len())
            .field("closed_generics", &self.closed_generics.len())
            .field("sources", &self.sources.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::container::CompositionContainer;
    use crate::composition::reflection::ConstructorInfo;
    use crate::composition::types::service;
    use std::sync::atomic::AtomicUsize;

    fn multiple(contract: &str, value: u8) -> ServiceInfo {
        ServiceInfo::from_instance(TypeRef::named(contract), value).allow_multiple(true)
    }

    #[test]
    fn test_single_registration_is_overridden() {
        let registry = ServiceRegistry::new();
        registry
            .register_instance(TypeRef::named("IClock"), 1_u8)
            .unwrap()
            .register_instance(TypeRef::named("IClock"), 2_u8)
            .unwrap();

        assert_eq!(registry.len(), 1);
        let descriptor = registry.try_get(&TypeRef::named("IClock")).unwrap();
        assert!(descriptor.as_multi().is_none());
        assert_eq!(descriptor.instance_type(), Some(&TypeRef::of::<u8>()));
    }

    #[test]
    fn test_multiple_registrations_accumulate() {
        let registry = ServiceRegistry::new();
        registry.register_service(multiple("IHandler", 1)).unwrap();
        registry.register_service(multiple("IHandler", 2)).unwrap();
        registry.register_service(multiple("IHandler", 3)).unwrap();

        let descriptor = registry.try_get(&TypeRef::named("IHandler")).unwrap();
        assert_eq!(descriptor.as_multi().map(|multi| multi.len()), Some(3));
        assert_eq!(descriptor.expand().len(), 3);
    }

    #[test]
    fn test_mixing_multiplicity_is_rejected() {
        let registry = ServiceRegistry::new();
        registry.register_instance(TypeRef::named("ISingle"), 1_u8).unwrap();
        let err = registry.register_service(multiple("ISingle", 2)).err().unwrap();
        assert!(matches!(err, CompositionError::AlreadyRegisteredAsSingle { .. }));

        registry.register_service(multiple("IMulti", 1)).unwrap();
        let err = registry
            .register_instance(TypeRef::named("IMulti"), 2_u8)
            .err()
            .unwrap();
        assert!(matches!(err, CompositionError::AlreadyRegisteredAsMultiple { .. }));
    }

    #[test]
    fn test_open_generic_is_registered_for_closed_contracts() {
        let registry = ServiceRegistry::new();
        let template = TypeInfo::generic_definition(TypeRef::definition("Repository", 1), |_| {
            Ok(TypeInfo::new(TypeRef::named("unused"))
                .with_constructor(ConstructorInfo::parameterless(|| Ok(service(0_u8)))))
        });
        registry
            .register_transient(TypeRef::definition("IRepository", 1), template)
            .unwrap();

        let closed = TypeRef::generic("IRepository", [TypeRef::named("User")]);
        assert!(registry.is_registered(&closed));
        assert!(!registry.is_registered(&TypeRef::named("IUnknown")));

        let (first, created) = registry.close_generic(&closed).unwrap().unwrap();
        assert!(created);
        let (second, created) = registry.close_generic(&closed).unwrap().unwrap();
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry
            .types()
            .contains(&TypeRef::generic("Repository", [TypeRef::named("User")])));
    }

    #[test]
    fn test_descriptors_follow_registration_order() {
        let registry = ServiceRegistry::new();
        for name in ["IC", "IA", "IB"] {
            registry.register_instance(TypeRef::named(name), 0_u8).unwrap();
        }
        let contracts: Vec<String> = registry
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.contract_type().to_string())
            .collect();
        assert_eq!(contracts, vec!["IC", "IA", "IB"]);
    }

    #[test]
    fn test_overridden_registration_is_disposed() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let counter = disposed.clone();
        let container = CompositionContainer::new();
        container
            .register_service(
                ServiceInfo::from_factory(TypeRef::named("IClock"), ServiceLifetime::Singleton, |_| {
                    Ok(service(1_u8))
                })
                .with_disposer(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        container.get_export(&TypeRef::named("IClock")).unwrap();

        container
            .registry()
            .register_instance(TypeRef::named("IClock"), 2_u8)
            .unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(*container.resolve::<u8>(&TypeRef::named("IClock")).unwrap(), 2);
    }

    #[test]
    fn test_reregistered_open_generic_disposes_closed_descriptors() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let template = || {
            TypeInfo::generic_definition(TypeRef::definition("Repository", 1), |_| {
                Ok(TypeInfo::new(TypeRef::named("Repository"))
                    .with_constructor(ConstructorInfo::parameterless(|| Ok(service(0_u8)))))
            })
        };
        let container = CompositionContainer::new();
        let counter = disposed.clone();
        container
            .register_service(
                ServiceInfo::from_type(
                    TypeRef::definition("IRepository", 1),
                    template(),
                    ServiceLifetime::Singleton,
                )
                .with_disposer(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        let closed = TypeRef::generic("IRepository", [TypeRef::named("User")]);
        container.get_export(&closed).unwrap();

        container
            .registry()
            .register_transient(TypeRef::definition("IRepository", 1), template())
            .unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert!(container.get_export(&closed).is_ok());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let registry = ServiceRegistry::new();
        registry.register_instance(TypeRef::named("IValue"), 1_u8).unwrap();
        registry.dispose();
        registry.dispose();
        assert!(registry.is_disposed());
    }
}
