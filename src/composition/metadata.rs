//! 服务元数据
//!
//! 每个实现类型对应一份键值映射，包含：
//! - 实现类型本身（键 [`IMPLEMENTATION_TYPE_KEY`]）
//! - 泛型参数提取器给出的值
//! - 实现类型上各特性声明的元数据值
//!
//! 与类型相关的部分缓存在 [`TypeInfo`] 上，描述符级别的组合结果缓存在描述符上。

use super::reflection::{Arguments, TypeInfo};
use super::registry::ServiceRegistry;
use super::types::{Service, TypeRef};
use crate::errors::{CompositionError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 实现类型的元数据键
pub const IMPLEMENTATION_TYPE_KEY: &str = "ImplementationType";

/// 元数据值
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Type(TypeRef),
    Value(serde_json::Value),
}

impl MetadataValue {
    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            MetadataValue::Type(type_ref) => Some(type_ref),
            MetadataValue::Value(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Value(value) => value.as_str(),
            MetadataValue::Type(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Value(value) => value.as_i64(),
            MetadataValue::Type(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Value(value) => value.as_bool(),
            MetadataValue::Type(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            MetadataValue::Value(value) => Some(value),
            MetadataValue::Type(_) => None,
        }
    }
}

impl From<TypeRef> for MetadataValue {
    fn from(value: TypeRef) -> Self {
        MetadataValue::Type(value)
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        MetadataValue::Value(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Value(serde_json::Value::from(value))
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Value(serde_json::Value::from(value))
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Value(serde_json::Value::from(value))
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Value(serde_json::Value::from(value))
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Value(serde_json::Value::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Value(serde_json::Value::from(value))
    }
}

/// 服务元数据映射，键有序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceMetadata {
    entries: BTreeMap<String, MetadataValue>,
}

impl ServiceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(MetadataValue::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(MetadataValue::as_bool)
    }

    pub fn get_type(&self, key: &str) -> Option<&TypeRef> {
        self.get(key).and_then(MetadataValue::as_type)
    }

    pub fn implementation_type(&self) -> Option<&TypeRef> {
        self.get_type(IMPLEMENTATION_TYPE_KEY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.entries.iter()
    }

    /// 用另一份元数据覆盖同名键
    pub fn overlay(&mut self, other: &ServiceMetadata) {
        for (key, value) in other.iter() {
            self.entries.insert(key.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, MetadataValue)> for ServiceMetadata {
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 可由元数据映射构造的强类型元数据视图
///
/// 通过 [`TypeInfo::metadata_view`] 声明后，`Lazy<T, M>` 与 `ExportFactory<T, M>`
/// 会为每个实现构造一个 `M`。
pub trait FromMetadata: Sized + Send + Sync + 'static {
    fn from_metadata(metadata: &ServiceMetadata) -> Result<Self>;
}

type Extractor = Arc<dyn Fn(&TypeInfo) -> Option<MetadataValue> + Send + Sync>;

/// 开放泛型契约的泛型参数元数据：名称 + 从实现类型提取值的方法
#[derive(Clone)]
pub struct GenericParameterMetadata {
    name: String,
    extractor: Extractor,
}

impl GenericParameterMetadata {
    pub fn new<F>(name: impl Into<String>, extractor: F) -> Self
    where
        F: Fn(&TypeInfo) -> Option<MetadataValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extractor: Arc::new(extractor),
        }
    }

    /// 取实现类型所实现的 `definition` 封闭接口的第 `index` 个类型参数
    pub fn from_interface(name: impl Into<String>, definition: TypeRef, index: usize) -> Self {
        Self::new(name, move |info: &TypeInfo| {
            info.interfaces()
                .iter()
                .find(|interface| interface.generic_definition().as_ref() == Some(&definition))
                .and_then(|interface| interface.type_args().get(index).cloned())
                .map(MetadataValue::Type)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extract(&self, implementation: &TypeInfo) -> Option<MetadataValue> {
        (self.extractor)(implementation)
    }
}

impl fmt::Debug for GenericParameterMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericParameterMetadata")
            .field("name", &self.name)
            .finish()
    }
}

/// 类型派生的元数据（实现类型 + 特性值），缓存在 `TypeInfo` 上
pub(crate) fn type_metadata(implementation: &TypeInfo) -> Arc<ServiceMetadata> {
    implementation.cached_metadata(|| {
        let mut metadata = ServiceMetadata::new();
        metadata.insert(IMPLEMENTATION_TYPE_KEY, implementation.type_ref().clone());
        for attribute in implementation.attributes() {
            for (key, value) in attribute.metadata_values() {
                metadata.insert(key.clone(), value.clone());
            }
        }
        metadata
    })
}

/// 组合描述符的完整元数据
pub(crate) fn build_service_metadata(
    implementation: Option<&TypeInfo>,
    instance_type: Option<&TypeRef>,
    generic_parameters: &[GenericParameterMetadata],
    explicit: &ServiceMetadata,
) -> ServiceMetadata {
    let mut metadata = match implementation {
        Some(info) => {
            let mut metadata = (*type_metadata(info)).clone();
            for parameter in generic_parameters {
                if let Some(value) = parameter.extract(info) {
                    metadata.insert(parameter.name(), value);
                }
            }
            metadata
        }
        None => {
            let mut metadata = ServiceMetadata::new();
            if let Some(instance_type) = instance_type {
                metadata.insert(IMPLEMENTATION_TYPE_KEY, instance_type.clone());
            }
            metadata
        }
    };
    metadata.overlay(explicit);
    metadata
}

/// 按调用方声明的元数据类型构造元数据视图
///
/// `MetadataMap` 直接返回映射本身；其他类型必须在类型目录中声明一个
/// 以 `MetadataMap` 为唯一参数的公共构造函数。
pub(crate) fn create_metadata_view(
    registry: &ServiceRegistry,
    metadata_type: &TypeRef,
    metadata: Arc<ServiceMetadata>,
) -> Result<Service> {
    if *metadata_type == TypeRef::metadata_map() {
        return Ok(metadata as Service);
    }

    let info = registry.type_info(metadata_type).ok_or_else(|| {
        CompositionError::NotSupported(format!(
            "metadata type '{}' is not declared in the type catalog",
            metadata_type
        ))
    })?;

    let map_type = TypeRef::metadata_map();
    let constructor = info
        .public_constructors()
        .find(|ctor| {
            ctor.parameters().len() == 1 && *ctor.parameters()[0].parameter_type() == map_type
        })
        .ok_or_else(|| {
            CompositionError::NotSupported(format!(
                "metadata type '{}' has no public constructor taking {}",
                metadata_type, map_type
            ))
        })?;

    constructor.invoke(&Arguments::new(vec![Some(metadata as Service)]))
}
