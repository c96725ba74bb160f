//! 运行时类型标识
//!
//! 契约类型、实现类型以及泛型包装形状（`Lazy<T>`、`ExportFactory<T>` 等）
//! 在运行时都以 [`TypeRef`] 表示。开放泛型定义（如 `IRepository<>`）与
//! 封闭泛型（如 `IRepository<User>`）可以互相转换。

use crate::errors::{CompositionError, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 类型擦除后的服务实例
pub type Service = Arc<dyn Any + Send + Sync>;

/// 将任意值装箱为 [`Service`]
pub fn service<T: Any + Send + Sync>(value: T) -> Service {
    Arc::new(value)
}

/// 将 [`Service`] 向下转型为具体类型
pub fn downcast_service<T: Any + Send + Sync>(service: Service, context: &str) -> Result<Arc<T>> {
    service
        .downcast::<T>()
        .map_err(|_| CompositionError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            context: context.to_string(),
        })
}

/// 内置包装形状的类型名
pub mod well_known {
    pub const ENUMERABLE: &str = "Enumerable";
    pub const COLLECTION: &str = "Collection";
    pub const LIST: &str = "List";
    pub const LAZY: &str = "Lazy";
    pub const EXPORT_FACTORY: &str = "ExportFactory";
    pub const METADATA_MAP: &str = "MetadataMap";
}

/// 运行时类型引用
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    /// 非泛型类型
    Simple(Arc<str>),
    /// 封闭泛型类型
    Generic { name: Arc<str>, args: Arc<[TypeRef]> },
    /// 开放泛型定义
    Definition { name: Arc<str>, arity: usize },
}

impl TypeRef {
    /// 按名称创建非泛型类型
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        TypeRef::Simple(name.into())
    }

    /// 以 Rust 类型名创建类型引用
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeRef::Simple(Arc::from(std::any::type_name::<T>()))
    }

    /// 创建封闭泛型
    pub fn generic(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = TypeRef>) -> Self {
        TypeRef::Generic {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// 创建开放泛型定义
    pub fn definition(name: impl Into<Arc<str>>, arity: usize) -> Self {
        TypeRef::Definition {
            name: name.into(),
            arity,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TypeRef::Simple(name) => &**name,
            TypeRef::Generic { name, .. } => &**name,
            TypeRef::Definition { name, .. } => &**name,
        }
    }

    /// 封闭泛型的类型参数；其他形式返回空切片
    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Generic { args, .. } => &args[..],
            _ => &[],
        }
    }

    pub fn is_generic_definition(&self) -> bool {
        matches!(self, TypeRef::Definition { .. })
    }

    pub fn is_constructed_generic(&self) -> bool {
        matches!(self, TypeRef::Generic { .. })
    }

    /// 封闭泛型对应的开放定义
    pub fn generic_definition(&self) -> Option<TypeRef> {
        match self {
            TypeRef::Generic { name, args } => Some(TypeRef::Definition {
                name: name.clone(),
                arity: args.len(),
            }),
            _ => None,
        }
    }

    /// 用给定类型参数封闭开放泛型定义
    pub fn make_generic(&self, type_args: &[TypeRef]) -> Result<TypeRef> {
        match self {
            TypeRef::Definition { name, arity } => {
                if *arity != type_args.len() {
                    return Err(CompositionError::InvalidGenericArity {
                        definition: self.clone(),
                        expected: *arity,
                        actual: type_args.len(),
                    });
                }
                Ok(TypeRef::Generic {
                    name: name.clone(),
                    args: type_args.iter().cloned().collect(),
                })
            }
            _ => Err(CompositionError::NotSupported(format!(
                "'{}' is not an open generic type definition",
                self
            ))),
        }
    }

    /// 判断是否为指定名称与元数的封闭泛型
    pub fn is_shape(&self, shape: &str, arity: usize) -> bool {
        match self {
            TypeRef::Generic { name, args } => &**name == shape && args.len() == arity,
            _ => false,
        }
    }

    pub fn enumerable(item: TypeRef) -> Self {
        Self::generic(well_known::ENUMERABLE, [item])
    }

    pub fn collection(item: TypeRef) -> Self {
        Self::generic(well_known::COLLECTION, [item])
    }

    pub fn list(item: TypeRef) -> Self {
        Self::generic(well_known::LIST, [item])
    }

    pub fn lazy(service: TypeRef) -> Self {
        Self::generic(well_known::LAZY, [service])
    }

    pub fn lazy_with_metadata(service: TypeRef, metadata: TypeRef) -> Self {
        Self::generic(well_known::LAZY, [service, metadata])
    }

    pub fn export_factory(service: TypeRef) -> Self {
        Self::generic(well_known::EXPORT_FACTORY, [service])
    }

    pub fn export_factory_with_metadata(service: TypeRef, metadata: TypeRef) -> Self {
        Self::generic(well_known::EXPORT_FACTORY, [service, metadata])
    }

    /// 元数据字典类型，元数据视图类型的构造函数以它为唯一参数
    pub fn metadata_map() -> Self {
        Self::named(well_known::METADATA_MAP)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Simple(name) => write!(f, "{}", name),
            TypeRef::Generic { name, args } => {
                write!(f, "{}<", name)?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeRef::Definition { name, arity } => {
                write!(f, "{}<{}>", name, ",".repeat(arity.saturating_sub(1)))
            }
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::named(name)
    }
}
