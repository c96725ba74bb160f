//! 组合容器错误类型
//!
//! 注册期错误（多重性冲突）在注册时立即返回；解析期错误（构造函数歧义、
//! 缺失、循环依赖等）同步返回给调用方，不做重试。

use crate::composition::types::TypeRef;
use log::{debug, error, warn};
use thiserror::Error;

/// 组合容器统一错误类型
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("Service contract '{contract}' is already registered as a single service; it cannot also allow multiple registrations")]
    AlreadyRegisteredAsSingle { contract: TypeRef },

    #[error("Service contract '{contract}' is registered with multiple implementations; a single registration is not allowed")]
    AlreadyRegisteredAsMultiple { contract: TypeRef },

    #[error("Ambiguous constructors for '{implementation}': ({first}) and ({second}) have the same number of resolvable parameters")]
    AmbiguousConstructor {
        implementation: TypeRef,
        first: String,
        second: String,
    },

    #[error("No suitable constructor found for '{implementation}'; unresolved parameters: [{}]", .unresolved.join(", "))]
    MissingConstructor {
        implementation: TypeRef,
        unresolved: Vec<String>,
    },

    #[error("Circular dependency detected while producing '{contract}': {}", .chain.join(" -> "))]
    CircularDependency { contract: TypeRef, chain: Vec<String> },

    #[error("No implementation found for service type '{service_type}'")]
    NoImplementation { service_type: TypeRef },

    #[error("Service type '{service_type}' has {count} implementations, but exactly one was expected")]
    MultipleImplementations { service_type: TypeRef, count: usize },

    #[error("Service '{contract}' is not registered")]
    ServiceNotFound { contract: TypeRef },

    #[error("The resolver engine is no longer usable: its owning container has been disposed")]
    ResolverDisposed,

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Type mismatch: expected '{expected}' while {context}")]
    TypeMismatch {
        expected: &'static str,
        context: String,
    },

    #[error("Generic type '{definition}' expects {expected} type arguments, got {actual}")]
    InvalidGenericArity {
        definition: TypeRef,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to create service '{service_type}': {reason}")]
    ActivationFailed { service_type: String, reason: String },
}

impl CompositionError {
    /// 供用户工厂使用的便捷构造
    pub fn activation(service_type: impl Into<String>, reason: impl ToString) -> Self {
        CompositionError::ActivationFailed {
            service_type: service_type.into(),
            reason: reason.to_string(),
        }
    }

    /// 是否为注册期（配置）错误
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CompositionError::AlreadyRegisteredAsSingle { .. }
                | CompositionError::AlreadyRegisteredAsMultiple { .. }
        )
    }

    /// 记录错误到日志
    pub fn log(&self) {
        match self {
            CompositionError::AlreadyRegisteredAsSingle { .. }
            | CompositionError::AlreadyRegisteredAsMultiple { .. }
            | CompositionError::CircularDependency { .. }
            | CompositionError::AmbiguousConstructor { .. } => {
                error!("{}", self);
            }
            CompositionError::ResolverDisposed => {
                debug!("Resolution attempted on a disposed container");
            }
            _ => {
                warn!("{}", self);
            }
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, CompositionError>;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
