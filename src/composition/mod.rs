//! 轻量级组合容器
//!
//! 服务以契约类型 [`TypeRef`] 注册，可以是现成实例、实现类型或工厂闭包。
//! 解析时自动完成构造函数注入，支持开放泛型、多重注册、集合 / 延迟 /
//! 导出工厂包装，以及同一线程内的循环依赖检测。
//!
//! ```ignore
//! let container = CompositionContainer::new();
//! container.registry().register_singleton(TypeRef::named("ILogger"), logger_type)?;
//! let logger = container.resolve::<ConsoleLogger>(&TypeRef::named("ILogger"))?;
//! ```

pub(crate) mod constructor;
pub mod container;
pub(crate) mod cycle;
pub mod metadata;
pub mod multi_service_info;
pub mod reflection;
pub mod registry;
pub mod resolver;
pub mod service_info;
pub mod sources;
pub mod stats;
pub mod types;

pub use container::CompositionContainer;
pub use metadata::{
    FromMetadata, GenericParameterMetadata, MetadataValue, ServiceMetadata, IMPLEMENTATION_TYPE_KEY,
};
pub use multi_service_info::MultiServiceInfo;
pub use reflection::{Arguments, AttributeInfo, ConstructorInfo, ParameterInfo, TypeCatalog, TypeInfo};
pub use registry::ServiceRegistry;
pub use resolver::ResolverEngine;
pub use service_info::{ServiceDescriptor, ServiceFactory, ServiceInfo, ServiceLifetime};
pub use sources::{
    CollectionKind, CollectionServiceSource, ExportFactory, ExportFactoryServiceSource,
    ExportFactoryWithMetadataServiceSource, LazyService, LazyServiceSource,
    LazyWithMetadataServiceSource, ServiceEntry, ServiceList, ServiceSource, ServiceThunk,
    SourceKind,
};
pub use stats::ContainerStats;
pub use types::{downcast_service, service, Service, TypeRef};
