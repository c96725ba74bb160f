pub mod composition;
pub mod config;
pub mod errors;
pub mod logging;

// Re-export commonly used items for convenience
pub use composition::{
    service, CompositionContainer, ConstructorInfo, ParameterInfo, ResolverEngine, Service,
    ServiceInfo, ServiceLifetime, ServiceRegistry, TypeInfo, TypeRef,
};
pub use config::CompositionConfig;
pub use errors::{CompositionError, ConfigError, Result};
