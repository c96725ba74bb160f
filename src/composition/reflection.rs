//! 显式声明的反射信息
//!
//! 实现类型在注册时声明自己的构造函数、特性与实现的接口，容器据此完成
//! 构造函数选择、依赖注入与元数据计算。开放泛型实现通过模板闭包在封闭时
//! 生成具体的 [`TypeInfo`]。

use super::metadata::{FromMetadata, MetadataValue, ServiceMetadata};
use super::types::{downcast_service, service, Service, TypeRef};
use crate::errors::{CompositionError, Result};
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

type Invoker = Arc<dyn Fn(&Arguments) -> Result<Service> + Send + Sync>;
type GenericTemplate = Arc<dyn Fn(&[TypeRef]) -> Result<TypeInfo> + Send + Sync>;

/// 构造函数参数
#[derive(Clone)]
pub struct ParameterInfo {
    name: Arc<str>,
    parameter_type: TypeRef,
    /// `Some(None)` 表示有默认值且默认值为空
    default: Option<Option<Service>>,
}

impl ParameterInfo {
    /// 必需参数
    pub fn new(name: impl Into<Arc<str>>, parameter_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            default: None,
        }
    }

    /// 可选参数，默认值为空
    pub fn optional(name: impl Into<Arc<str>>, parameter_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            default: Some(None),
        }
    }

    /// 带默认值的可选参数
    pub fn with_default<T: Any + Send + Sync>(
        name: impl Into<Arc<str>>,
        parameter_type: TypeRef,
        value: T,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            default: Some(Some(service(value))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_type(&self) -> &TypeRef {
        &self.parameter_type
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value(&self) -> Option<Service> {
        self.default.clone().flatten()
    }
}

impl fmt::Display for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.parameter_type)?;
        if self.has_default() {
            write!(f, " = default")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterInfo({})", self)
    }
}

/// 构造函数：参数列表 + 调用闭包
#[derive(Clone)]
pub struct ConstructorInfo {
    parameters: Vec<ParameterInfo>,
    is_public: bool,
    invoker: Invoker,
}

impl ConstructorInfo {
    pub fn new<F>(parameters: Vec<ParameterInfo>, invoker: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Service> + Send + Sync + 'static,
    {
        Self {
            parameters,
            is_public: true,
            invoker: Arc::new(invoker),
        }
    }

    /// 无参构造函数
    pub fn parameterless<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Service> + Send + Sync + 'static,
    {
        Self::new(Vec::new(), move |_| factory())
    }

    /// 标记为非公共构造函数，不参与构造函数选择
    pub fn non_public(mut self) -> Self {
        self.is_public = false;
        self
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn invoke(&self, arguments: &Arguments) -> Result<Service> {
        (self.invoker)(arguments)
    }

    /// 形如 `logger: ILogger, retries: u32 = default` 的参数签名
    pub fn signature(&self) -> String {
        self.parameters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstructorInfo({})", self.signature())
    }
}

/// 调用构造函数时已解析的参数
pub struct Arguments {
    values: Vec<Option<Service>>,
}

impl Arguments {
    pub fn new(values: Vec<Option<Service>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&Service> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// 读取必需参数
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        match self.raw(index) {
            Some(value) => downcast_service(value.clone(), &format!("reading argument #{}", index)),
            None => Err(CompositionError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                context: format!("argument #{} has no value", index),
            }),
        }
    }

    /// 读取可选参数，空值返回 `None`
    pub fn get_optional<T: Any + Send + Sync>(&self, index: usize) -> Result<Option<Arc<T>>> {
        match self.raw(index) {
            Some(value) => {
                downcast_service(value.clone(), &format!("reading argument #{}", index)).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// 实现类型上的特性，携带元数据值
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    name: Arc<str>,
    values: Vec<(String, MetadataValue)>,
}

impl AttributeInfo {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata_values(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.values.iter().map(|(key, value)| (key, value))
    }
}

/// 实现类型的反射信息
pub struct TypeInfo {
    type_ref: TypeRef,
    constructors: Vec<ConstructorInfo>,
    attributes: Vec<AttributeInfo>,
    interfaces: Vec<TypeRef>,
    template: Option<GenericTemplate>,
    metadata: OnceLock<Arc<ServiceMetadata>>,
}

impl TypeInfo {
    pub fn new(type_ref: TypeRef) -> Self {
        Self {
            type_ref,
            constructors: Vec::new(),
            attributes: Vec::new(),
            interfaces: Vec::new(),
            template: None,
            metadata: OnceLock::new(),
        }
    }

    /// 以 Rust 类型名创建
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeRef::of::<T>())
    }

    /// 开放泛型实现类型；封闭时由 `template` 根据类型参数生成具体类型信息
    pub fn generic_definition<F>(definition: TypeRef, template: F) -> Self
    where
        F: Fn(&[TypeRef]) -> Result<TypeInfo> + Send + Sync + 'static,
    {
        let mut info = Self::new(definition);
        info.template = Some(Arc::new(template));
        info
    }

    /// 元数据视图类型：唯一构造函数接收 `MetadataMap`
    pub fn metadata_view<M: FromMetadata>() -> Self {
        Self::of::<M>().with_constructor(ConstructorInfo::new(
            vec![ParameterInfo::new("metadata", TypeRef::metadata_map())],
            |args| {
                let metadata = args.get::<ServiceMetadata>(0)?;
                Ok(service(M::from_metadata(&metadata)?))
            },
        ))
    }

    pub fn with_constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeInfo) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// 声明实现的接口（封闭契约类型）
    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    pub fn public_constructors(&self) -> impl Iterator<Item = &ConstructorInfo> {
        self.constructors.iter().filter(|ctor| ctor.is_public())
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    pub fn is_generic_definition(&self) -> bool {
        self.type_ref.is_generic_definition()
    }

    /// 用类型参数封闭开放泛型实现
    pub fn make_generic_type(&self, type_args: &[TypeRef]) -> Result<TypeInfo> {
        let closed = self.type_ref.make_generic(type_args)?;
        let template = self.template.as_ref().ok_or_else(|| {
            CompositionError::NotSupported(format!(
                "generic type definition '{}' declares no template",
                self.type_ref
            ))
        })?;
        let mut info = template(type_args)?;
        info.type_ref = closed;
        Ok(info)
    }

    pub(crate) fn cached_metadata<F>(&self, compute: F) -> Arc<ServiceMetadata>
    where
        F: FnOnce() -> ServiceMetadata,
    {
        self.metadata.get_or_init(|| Arc::new(compute())).clone()
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("type_ref", &self.type_ref)
            .field("constructors", &self.constructors)
            .field("attributes", &self.attributes)
            .field("interfaces", &self.interfaces)
            .field("generic_template", &self.template.is_some())
            .finish()
    }
}

/// 类型目录
#[derive(Default)]
pub struct TypeCatalog {
    types: DashMap<TypeRef, Arc<TypeInfo>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, info: Arc<TypeInfo>) -> Arc<TypeInfo> {
        self.types.insert(info.type_ref().clone(), info.clone());
        info
    }

    pub fn get(&self, type_ref: &TypeRef) -> Option<Arc<TypeInfo>> {
        self.types.get(type_ref).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, type_ref: &TypeRef) -> bool {
        self.types.contains_key(type_ref)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
