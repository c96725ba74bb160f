//! 服务源
//!
//! 服务源为没有直接注册的包装契约合成服务：
//! - `Enumerable<T>` / `Collection<T>` / `List<T>`：所有实现的列表
//! - `Lazy<T>` / `Lazy<T, M>`：延迟创建的单个实现
//! - `ExportFactory<T>` / `ExportFactory<T, M>`：可反复创建实例的工厂
//!
//! 包装可以嵌套，例如 `Enumerable<Lazy<T, M>>`：外层源通过引擎取得内层契约的条目。

pub mod collection;
pub mod export_factory;
pub mod lazy;

pub use collection::{CollectionKind, CollectionServiceSource, ServiceList};
pub use export_factory::{ExportFactory, ExportFactoryServiceSource, ExportFactoryWithMetadataServiceSource};
pub use lazy::{LazyService, LazyServiceSource, LazyWithMetadataServiceSource};

use super::metadata::{create_metadata_view, ServiceMetadata};
use super::resolver::ResolverEngine;
use super::service_info::ServiceInfo;
use super::types::{service, Service, TypeRef};
use crate::errors::{CompositionError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 延迟生产一个服务实例
pub type ServiceThunk = Arc<dyn Fn() -> Result<Service> + Send + Sync>;

/// 服务条目：描述符 + 生产闭包
#[derive(Clone)]
pub struct ServiceEntry {
    info: Arc<ServiceInfo>,
    factory: ServiceThunk,
}

impl ServiceEntry {
    pub fn new(info: Arc<ServiceInfo>, factory: ServiceThunk) -> Self {
        Self { info, factory }
    }

    pub fn info(&self) -> &Arc<ServiceInfo> {
        &self.info
    }

    pub fn factory(&self) -> &ServiceThunk {
        &self.factory
    }

    pub fn metadata(&self) -> Arc<ServiceMetadata> {
        self.info.metadata()
    }

    pub fn create(&self) -> Result<Service> {
        (self.factory)()
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry").field("info", &self.info).finish()
    }
}

/// 服务源 trait
pub trait ServiceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// 该源是否能提供给定契约
    fn is_match(&self, contract_type: &TypeRef) -> bool;

    fn get_service_entries(
        &self,
        engine: &ResolverEngine,
        contract_type: &TypeRef,
    ) -> Result<Vec<ServiceEntry>>;

    /// 默认要求恰好一个条目
    fn get_service(&self, engine: &ResolverEngine, contract_type: &TypeRef) -> Result<Service> {
        let entries = self.get_service_entries(engine, contract_type)?;
        let service_type = wrapped_service_type(contract_type)?;
        single_entry(entries, service_type)?.create()
    }
}

/// 包装契约的第一个类型参数即被包装的服务类型
pub(crate) fn wrapped_service_type(contract_type: &TypeRef) -> Result<&TypeRef> {
    contract_type.type_args().first().ok_or_else(|| {
        CompositionError::NotSupported(format!(
            "'{}' is not a constructed wrapper type",
            contract_type
        ))
    })
}

pub(crate) fn single_entry(mut entries: Vec<ServiceEntry>, service_type: &TypeRef) -> Result<ServiceEntry> {
    match entries.len() {
        0 => Err(CompositionError::NoImplementation {
            service_type: service_type.clone(),
        }),
        1 => Ok(entries.remove(0)),
        count => Err(CompositionError::MultipleImplementations {
            service_type: service_type.clone(),
            count,
        }),
    }
}

/// 把内层条目逐个包装成 `W`
///
/// 第二个类型参数（若有）是元数据类型，每个条目构造一次元数据视图。
pub(crate) fn wrap_entries<W, F>(
    engine: &ResolverEngine,
    contract_type: &TypeRef,
    wrap: F,
) -> Result<Vec<ServiceEntry>>
where
    W: Any + Send + Sync,
    F: Fn(ServiceThunk, Option<Service>) -> W + Clone + Send + Sync + 'static,
{
    let service_type = wrapped_service_type(contract_type)?;
    let metadata_type = contract_type.type_args().get(1);
    let registry = match metadata_type {
        Some(_) => Some(engine.registry()?),
        None => None,
    };

    let mut entries = Vec::new();
    for entry in engine.get_service_entries(service_type)? {
        let metadata = match (metadata_type, &registry) {
            (Some(metadata_type), Some(registry)) => {
                Some(create_metadata_view(registry, metadata_type, entry.metadata())?)
            }
            _ => None,
        };
        let inner = entry.factory().clone();
        let wrap = wrap.clone();
        entries.push(ServiceEntry::new(
            entry.info().clone(),
            Arc::new(move || -> Result<Service> {
                Ok(service(wrap(inner.clone(), metadata.clone())))
            }),
        ));
    }
    Ok(entries)
}

/// 容器默认安装的服务源种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Enumerable,
    Collection,
    List,
    Lazy,
    LazyWithMetadata,
    ExportFactory,
    ExportFactoryWithMetadata,
}

impl SourceKind {
    pub fn all() -> Vec<SourceKind> {
        vec![
            SourceKind::Enumerable,
            SourceKind::Collection,
            SourceKind::List,
            SourceKind::Lazy,
            SourceKind::LazyWithMetadata,
            SourceKind::ExportFactory,
            SourceKind::ExportFactoryWithMetadata,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Enumerable => "enumerable",
            SourceKind::Collection => "collection",
            SourceKind::List => "list",
            SourceKind::Lazy => "lazy",
            SourceKind::LazyWithMetadata => "lazy_with_metadata",
            SourceKind::ExportFactory => "export_factory",
            SourceKind::ExportFactoryWithMetadata => "export_factory_with_metadata",
        }
    }

    pub fn create(&self) -> Arc<dyn ServiceSource> {
        match self {
            SourceKind::Enumerable => Arc::new(CollectionServiceSource::new(CollectionKind::Enumerable)),
            SourceKind::Collection => Arc::new(CollectionServiceSource::new(CollectionKind::Collection)),
            SourceKind::List => Arc::new(CollectionServiceSource::new(CollectionKind::List)),
            SourceKind::Lazy => Arc::new(LazyServiceSource),
            SourceKind::LazyWithMetadata => Arc::new(LazyWithMetadataServiceSource),
            SourceKind::ExportFactory => Arc::new(ExportFactoryServiceSource),
            SourceKind::ExportFactoryWithMetadata => Arc::new(ExportFactoryWithMetadataServiceSource),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        SourceKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown service source '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("lazy".parse::<SourceKind>(), Ok(SourceKind::Lazy));
        assert_eq!(
            "Export-Factory-With-Metadata".parse::<SourceKind>(),
            Ok(SourceKind::ExportFactoryWithMetadata)
        );
        assert!("unknown".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_created_sources_match_their_shape() {
        let item = TypeRef::named("IService");
        let cases = [
            (SourceKind::Enumerable, TypeRef::enumerable(item.clone())),
            (SourceKind::List, TypeRef::list(item.clone())),
            (SourceKind::Lazy, TypeRef::lazy(item.clone())),
            (
                SourceKind::ExportFactoryWithMetadata,
                TypeRef::export_factory_with_metadata(item.clone(), TypeRef::metadata_map()),
            ),
        ];
        for (kind, contract) in cases {
            let source = kind.create();
            assert!(source.is_match(&contract), "{kind} should match {contract}");
            assert!(!source.is_match(&item));
        }
    }

    #[test]
    fn test_single_entry_errors() {
        let service_type = TypeRef::named("IService");
        let err = single_entry(Vec::new(), &service_type).unwrap_err();
        assert!(matches!(err, CompositionError::NoImplementation { .. }));
    }
}
