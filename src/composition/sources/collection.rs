//! 集合服务源：`Enumerable<T>`、`Collection<T>`、`List<T>`

use super::{wrapped_service_type, ServiceEntry, ServiceSource};
use crate::composition::resolver::ResolverEngine;
use crate::composition::types::{downcast_service, service, well_known, Service, TypeRef};
use crate::errors::Result;
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Enumerable,
    Collection,
    List,
}

impl CollectionKind {
    pub fn shape(&self) -> &'static str {
        match self {
            CollectionKind::Enumerable => well_known::ENUMERABLE,
            CollectionKind::Collection => well_known::COLLECTION,
            CollectionKind::List => well_known::LIST,
        }
    }
}

/// 解析得到的服务列表，按注册顺序排列
#[derive(Clone, Default)]
pub struct ServiceList {
    items: Vec<Service>,
}

impl ServiceList {
    pub fn new(items: Vec<Service>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Service> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Service> {
        self.items.iter()
    }

    pub fn items(&self) -> &[Service] {
        &self.items
    }

    /// 把每一项向下转型为 `T`
    pub fn downcast_all<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
        self.items
            .iter()
            .map(|item| downcast_service(item.clone(), "service list item"))
            .collect()
    }

    pub fn into_vec(self) -> Vec<Service> {
        self.items
    }
}

impl<'a> IntoIterator for &'a ServiceList {
    type Item = &'a Service;
    type IntoIter = std::slice::Iter<'a, Service>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl std::fmt::Debug for ServiceList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceList").field("len", &self.items.len()).finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectionServiceSource {
    kind: CollectionKind,
}

impl CollectionServiceSource {
    pub fn new(kind: CollectionKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }
}

impl ServiceSource for CollectionServiceSource {
    fn name(&self) -> &'static str {
        match self.kind {
            CollectionKind::Enumerable => "enumerable",
            CollectionKind::Collection => "collection",
            CollectionKind::List => "list",
        }
    }

    fn is_match(&self, contract_type: &TypeRef) -> bool {
        contract_type.is_shape(self.kind.shape(), 1)
    }

    /// 集合的条目即元素类型的条目
    fn get_service_entries(
        &self,
        engine: &ResolverEngine,
        contract_type: &TypeRef,
    ) -> Result<Vec<ServiceEntry>> {
        engine.get_service_entries(wrapped_service_type(contract_type)?)
    }

    /// 没有任何实现时返回空列表
    fn get_service(&self, engine: &ResolverEngine, contract_type: &TypeRef) -> Result<Service> {
        let items = self
            .get_service_entries(engine, contract_type)?
            .iter()
            .map(ServiceEntry::create)
            .collect::<Result<Vec<_>>>()?;
        Ok(service(ServiceList::new(items)))
    }
}
