//! 服务描述符
//!
//! 描述一个契约如何生产实例：
//! - 现成实例（生命周期固定为单例）
//! - 实现类型，通过构造函数注入创建
//! - 工厂闭包，绑定到当前解析上下文
//!
//! 单例采用双重检查锁：先做无锁读检查，再在描述符锁内复查并只计算一次。

use super::constructor::ResolvedConstructor;
use super::cycle::ProductionGuard;
use super::metadata::{
    build_service_metadata, GenericParameterMetadata, MetadataValue, ServiceMetadata,
};
use super::multi_service_info::MultiServiceInfo;
use super::reflection::TypeInfo;
use super::resolver::ResolverEngine;
use super::types::{service, Service, TypeRef};
use crate::errors::{CompositionError, Result};
use crate::logging::OperationTimer;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLifetime {
    /// 单例 - 首次解析时创建并缓存
    Singleton,
    /// 瞬态 - 每次解析都创建新实例
    Transient,
}

/// 用户提供的服务工厂
pub type ServiceFactory = Arc<dyn Fn(&ResolverEngine) -> Result<Service> + Send + Sync>;

type Disposer = Arc<dyn Fn(&Service) + Send + Sync>;

static NEXT_DESCRIPTOR_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_descriptor_id() -> u64 {
    NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed)
}

/// 注册表中保存的描述符（单个或多重）
pub trait ServiceDescriptor: Send + Sync {
    /// 描述符标识，循环检测以此区分生产者
    fn id(&self) -> u64;

    fn contract_type(&self) -> &TypeRef;

    /// 对外公布的服务类型，未单独指定时等于契约类型
    fn service_type(&self) -> &TypeRef;

    fn instance_type(&self) -> Option<&TypeRef>;

    fn lifetime(&self) -> ServiceLifetime;

    fn allows_multiple(&self) -> bool;

    fn is_externally_owned(&self) -> bool;

    /// 生产一个服务实例
    fn get_service(&self, engine: &ResolverEngine) -> Result<Service>;

    /// 用类型参数封闭开放泛型注册，返回全新的描述符
    fn make_generic(&self, type_args: &[TypeRef]) -> Result<Arc<dyn ServiceDescriptor>>;

    /// 展开为单个描述符列表
    fn expand(self: Arc<Self>) -> Vec<Arc<ServiceInfo>>;

    fn as_multi(&self) -> Option<&MultiServiceInfo> {
        None
    }

    /// 释放持有的单例实例
    fn dispose(&self);
}

enum Activation {
    Instance,
    Type(Arc<TypeInfo>),
    Factory(ServiceFactory),
}

/// 单个服务描述符
pub struct ServiceInfo {
    id: u64,
    contract_type: TypeRef,
    service_type: Option<TypeRef>,
    instance_type: Option<TypeRef>,
    activation: Activation,
    lifetime: ServiceLifetime,
    allow_multiple: bool,
    externally_owned: bool,
    metadata_entries: ServiceMetadata,
    generic_parameters: Vec<GenericParameterMetadata>,
    disposer: Option<Disposer>,
    constructor: Mutex<Option<Arc<ResolvedConstructor>>>,
    value: RwLock<Option<Service>>,
    production_lock: Mutex<()>,
    metadata: OnceLock<Arc<ServiceMetadata>>,
}

impl ServiceInfo {
    fn with_activation(
        contract_type: TypeRef,
        activation: Activation,
        instance_type: Option<TypeRef>,
        value: Option<Service>,
        lifetime: ServiceLifetime,
    ) -> Self {
        Self {
            id: next_descriptor_id(),
            contract_type,
            service_type: None,
            instance_type,
            activation,
            lifetime,
            allow_multiple: false,
            externally_owned: false,
            metadata_entries: ServiceMetadata::new(),
            generic_parameters: Vec::new(),
            disposer: None,
            constructor: Mutex::new(None),
            value: RwLock::new(value),
            production_lock: Mutex::new(()),
            metadata: OnceLock::new(),
        }
    }

    /// 以现成实例注册；生命周期固定为单例
    pub fn from_instance<T: Any + Send + Sync>(contract_type: TypeRef, instance: T) -> Self {
        Self::from_service(contract_type, service(instance), TypeRef::of::<T>())
    }

    /// 以已擦除类型的实例注册
    pub fn from_service(contract_type: TypeRef, instance: Service, instance_type: TypeRef) -> Self {
        Self::with_activation(
            contract_type,
            Activation::Instance,
            Some(instance_type),
            Some(instance),
            ServiceLifetime::Singleton,
        )
    }

    /// 以实现类型注册，通过构造函数注入创建
    pub fn from_type(
        contract_type: TypeRef,
        implementation: impl Into<Arc<TypeInfo>>,
        lifetime: ServiceLifetime,
    ) -> Self {
        let implementation = implementation.into();
        let instance_type = Some(implementation.type_ref().clone());
        Self::with_activation(
            contract_type,
            Activation::Type(implementation),
            instance_type,
            None,
            lifetime,
        )
    }

    /// 以工厂闭包注册
    pub fn from_factory<F>(contract_type: TypeRef, lifetime: ServiceLifetime, factory: F) -> Self
    where
        F: Fn(&ResolverEngine) -> Result<Service> + Send + Sync + 'static,
    {
        Self::with_activation(
            contract_type,
            Activation::Factory(Arc::new(factory)),
            None,
            None,
            lifetime,
        )
    }

    pub fn with_service_type(mut self, service_type: TypeRef) -> Self {
        self.service_type = Some(service_type);
        self
    }

    pub fn allow_multiple(mut self, allow_multiple: bool) -> Self {
        self.allow_multiple = allow_multiple;
        self
    }

    /// 外部拥有的实例在释放时不会调用释放钩子
    pub fn externally_owned(mut self, externally_owned: bool) -> Self {
        self.externally_owned = externally_owned;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata_entries.insert(key, value);
        self
    }

    pub fn with_generic_parameter_metadata(mut self, parameter: GenericParameterMetadata) -> Self {
        self.generic_parameters.push(parameter);
        self
    }

    /// 单例实例被释放时调用
    pub fn with_disposer<F>(mut self, disposer: F) -> Self
    where
        F: Fn(&Service) + Send + Sync + 'static,
    {
        self.disposer = Some(Arc::new(disposer));
        self
    }

    pub fn implementation_info(&self) -> Option<&Arc<TypeInfo>> {
        match &self.activation {
            Activation::Type(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.activation, Activation::Instance)
    }

    pub fn is_factory(&self) -> bool {
        matches!(self.activation, Activation::Factory(_))
    }

    /// 单例是否已经创建
    pub fn is_value_created(&self) -> bool {
        self.value.read().is_some()
    }

    /// 描述符元数据（首次访问时计算并缓存）
    pub fn metadata(&self) -> Arc<ServiceMetadata> {
        self.metadata
            .get_or_init(|| {
                Arc::new(build_service_metadata(
                    self.implementation_info().map(|info| info.as_ref()),
                    self.instance_type.as_ref(),
                    &self.generic_parameters,
                    &self.metadata_entries,
                ))
            })
            .clone()
    }

    pub fn get_service(&self, engine: &ResolverEngine) -> Result<Service> {
        if self.is_instance() {
            return self.value.read().clone().ok_or(CompositionError::ResolverDisposed);
        }

        match self.lifetime {
            ServiceLifetime::Singleton => self.get_or_create_singleton(engine),
            ServiceLifetime::Transient => {
                let _guard = ProductionGuard::enter(self.id, &self.contract_type)?;
                let value = self.create(engine)?;
                engine.stats().record_transient_creation();
                Ok(value)
            }
        }
    }

    fn get_or_create_singleton(&self, engine: &ResolverEngine) -> Result<Service> {
        if let Some(value) = self.value.read().as_ref() {
            engine.stats().record_singleton_hit();
            return Ok(value.clone());
        }

        // 先标记再加锁：同一线程的重入在这里报告循环，而不是死锁
        let _guard = ProductionGuard::enter(self.id, &self.contract_type)?;
        let _production = self.production_lock.lock();

        if let Some(value) = self.value.read().as_ref() {
            engine.stats().record_singleton_hit();
            return Ok(value.clone());
        }

        let contract = self.contract_type.to_string();
        let timer = OperationTimer::new("materialize_singleton").with_metadata("contract", &contract);
        let value = self.create(engine)?;
        *self.value.write() = Some(value.clone());
        engine.stats().record_singleton_miss();
        timer.finish();

        Ok(value)
    }

    fn create(&self, engine: &ResolverEngine) -> Result<Service> {
        match &self.activation {
            Activation::Type(implementation) => {
                self.constructor(implementation, engine)?.invoke(engine)
            }
            Activation::Factory(factory) => factory(engine),
            Activation::Instance => self.value.read().clone().ok_or(CompositionError::ResolverDisposed),
        }
    }

    /// 构造函数只选择一次，与生命周期无关
    fn constructor(
        &self,
        implementation: &TypeInfo,
        engine: &ResolverEngine,
    ) -> Result<Arc<ResolvedConstructor>> {
        let mut slot = self.constructor.lock();
        if let Some(resolved) = slot.as_ref() {
            return Ok(resolved.clone());
        }
        let resolved = Arc::new(ResolvedConstructor::select(implementation, engine)?);
        *slot = Some(resolved.clone());
        Ok(resolved)
    }

    /// 封闭开放泛型注册
    ///
    /// 仅适用于以实现类型注册到开放泛型契约上的描述符。
    pub fn make_generic_service_info(&self, type_args: &[TypeRef]) -> Result<ServiceInfo> {
        let implementation = match &self.activation {
            Activation::Type(implementation) => implementation,
            _ => {
                return Err(CompositionError::NotSupported(format!(
                    "'{}' is registered with an instance or a factory and cannot be made generic",
                    self.contract_type
                )))
            }
        };
        if !self.contract_type.is_generic_definition() {
            return Err(CompositionError::NotSupported(format!(
                "'{}' is not an open generic contract",
                self.contract_type
            )));
        }

        let contract_type = self.contract_type.make_generic(type_args)?;
        let service_type = match &self.service_type {
            Some(service_type) if service_type.is_generic_definition() => {
                Some(service_type.make_generic(type_args)?)
            }
            other => other.clone(),
        };
        let implementation = implementation.make_generic_type(type_args)?;

        let mut closed = ServiceInfo::from_type(contract_type, implementation, self.lifetime);
        closed.service_type = service_type;
        closed.allow_multiple = self.allow_multiple;
        closed.externally_owned = self.externally_owned;
        closed.metadata_entries = self.metadata_entries.clone();
        closed.generic_parameters = self.generic_parameters.clone();
        closed.disposer = self.disposer.clone();
        Ok(closed)
    }

    pub fn dispose(&self) {
        let value = self.value.write().take();
        if let Some(value) = value {
            if !self.externally_owned {
                if let Some(disposer) = &self.disposer {
                    disposer(&value);
                }
            }
            tracing::debug!(contract = %self.contract_type, "Released service instance");
        }
    }
}

impl ServiceDescriptor for ServiceInfo {
    fn id(&self) -> u64 {
        self.id
    }

    fn contract_type(&self) -> &TypeRef {
        &self.contract_type
    }

    fn service_type(&self) -> &TypeRef {
        self.service_type.as_ref().unwrap_or(&self.contract_type)
    }

    fn instance_type(&self) -> Option<&TypeRef> {
        self.instance_type.as_ref()
    }

    fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    fn allows_multiple(&self) -> bool {
        self.allow_multiple
    }

    fn is_externally_owned(&self) -> bool {
        self.externally_owned
    }

    fn get_service(&self, engine: &ResolverEngine) -> Result<Service> {
        ServiceInfo::get_service(self, engine)
    }

    fn make_generic(&self, type_args: &[TypeRef]) -> Result<Arc<dyn ServiceDescriptor>> {
        Ok(Arc::new(self.make_generic_service_info(type_args)?))
    }

    fn expand(self: Arc<Self>) -> Vec<Arc<ServiceInfo>> {
        vec![self]
    }

    fn dispose(&self) {
        ServiceInfo::dispose(self)
    }
}

impl fmt::Debug for ServiceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activation = match &self.activation {
            Activation::Instance => "instance",
            Activation::Type(_) => "type",
            Activation::Factory(_) => "factory",
        };
        f.debug_struct("ServiceInfo")
            .field("id", &self.id)
            .field("contract_type", &self.contract_type)
            .field("service_type", &self.service_type)
            .field("instance_type", &self.instance_type)
            .field("activation", &activation)
            .field("lifetime", &self.lifetime)
            .field("allow_multiple", &self.allow_multiple)
            .field("externally_owned", &self.externally_owned)
            .finish()
    }
}
