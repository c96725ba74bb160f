//! 导出工厂服务源：`ExportFactory<T>` 与 `ExportFactory<T, M>`

use super::{wrap_entries, ServiceEntry, ServiceSource, ServiceThunk};
use crate::composition::resolver::ResolverEngine;
use crate::composition::types::{downcast_service, well_known, Service, TypeRef};
use crate::errors::{CompositionError, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 导出工厂：每次调用 [`create_export`](ExportFactory::create_export) 都走底层描述符，
/// 瞬态实现得到新实例，单例实现得到同一实例
pub struct ExportFactory {
    factory: ServiceThunk,
    metadata: Option<Service>,
}

impl ExportFactory {
    pub fn new(factory: ServiceThunk) -> Self {
        Self::from_parts(factory, None)
    }

    pub(crate) fn from_parts(factory: ServiceThunk, metadata: Option<Service>) -> Self {
        Self { factory, metadata }
    }

    pub fn create_export(&self) -> Result<Service> {
        (self.factory)()
    }

    pub fn create_export_as<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        downcast_service(self.create_export()?, "export factory")
    }

    pub fn metadata(&self) -> Option<&Service> {
        self.metadata.as_ref()
    }

    pub fn metadata_as<M: Any + Send + Sync>(&self) -> Result<Arc<M>> {
        let metadata = self.metadata.clone().ok_or_else(|| {
            CompositionError::NotSupported(
                "export factory was resolved without metadata".to_string(),
            )
        })?;
        downcast_service(metadata, "export factory metadata")
    }
}

impl fmt::Debug for ExportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportFactory")
            .field("has_metadata", &self.metadata.is_some())
            .finish()
    }
}

/// `ExportFactory<T>`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportFactoryServiceSource;

impl ServiceSource for ExportFactoryServiceSource {
    fn name(&self) -> &'static str {
        "export_factory"
    }

    fn is_match(&self, contract_type: &TypeRef) -> bool {
        contract_type.is_shape(well_known::EXPORT_FACTORY, 1)
    }

    fn get_service_entries(
        &self,
        engine: &ResolverEngine,
        contract_type: &TypeRef,
    ) -> Result<Vec<ServiceEntry>> {
        wrap_entries(engine, contract_type, ExportFactory::from_parts)
    }
}

/// `ExportFactory<T, M>`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportFactoryWithMetadataServiceSource;

impl ServiceSource for ExportFactoryWithMetadataServiceSource {
    fn name(&self) -> &'static str {
        "export_factory_with_metadata"
    }

    fn is_match(&self, contract_type: &TypeRef) -> bool {
        contract_type.is_shape(well_known::EXPORT_FACTORY, 2)
    }

    fn get_service_entries(
        &self,
        engine: &ResolverEngine,
        contract_type: &TypeRef,
    ) -> Result<Vec<ServiceEntry>> {
        wrap_entries(engine, contract_type, ExportFactory::from_parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::container::CompositionContainer;
    use crate::composition::reflection::{ConstructorInfo, TypeInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_transient_export_factory_creates_new_instances() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let container = CompositionContainer::new();
        container
            .registry()
            .register_transient(
                TypeRef::named("IWorker"),
                TypeInfo::new(TypeRef::named("Worker")).with_constructor(
                    ConstructorInfo::parameterless(move || {
                        Ok(crate::composition::types::service(
                            counter.fetch_add(1, Ordering::SeqCst),
                        ))
                    }),
                ),
            )
            .unwrap();

        let factory = container
            .resolve::<ExportFactory>(&TypeRef::export_factory(TypeRef::named("IWorker")))
            .unwrap();
        let first = factory.create_export_as::<usize>().unwrap();
        let second = factory.create_export_as::<usize>().unwrap();
        assert_ne!(*first, *second);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_export_factory_without_implementation_fails() {
        let container = CompositionContainer::new();
        let err = container
            .get_export(&TypeRef::export_factory(TypeRef::named("IMissing")))
            .unwrap_err();
        assert!(matches!(err, CompositionError::NoImplementation { .. }));
    }
}
