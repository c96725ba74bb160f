//! 端到端场景：ILogger 单例 + IService 瞬态，以及配置驱动的容器

use kephas_composition::composition::{
    Arguments, ConstructorInfo, ParameterInfo, ServiceList, SourceKind, TypeInfo, TypeRef,
};
use kephas_composition::logging::{init_logging, LoggingConfig};
use kephas_composition::{service, CompositionConfig, CompositionContainer, CompositionError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

trait Logger: Send + Sync {
    fn log(&self, message: &str);
    fn lines(&self) -> Vec<String>;
}

#[derive(Default)]
struct ConsoleLogger {
    lines: Mutex<Vec<String>>,
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}

trait BusinessService: Send + Sync {
    fn run(&self) -> &'static str;
    fn logger(&self) -> &Arc<dyn Logger>;
}

struct ServiceA {
    logger: Arc<dyn Logger>,
}

impl BusinessService for ServiceA {
    fn run(&self) -> &'static str {
        self.logger.log("ServiceA running");
        "A"
    }

    fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }
}

fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = init_logging(LoggingConfig::testing());
}

/// 契约为 trait 时，服务值是 `Arc<dyn Trait>`
fn register_scenario(container: &CompositionContainer) {
    let logger_type = TypeInfo::of::<ConsoleLogger>().with_constructor(ConstructorInfo::parameterless(|| {
        let logger: Arc<dyn Logger> = Arc::new(ConsoleLogger::default());
        Ok(service(logger))
    }));

    let service_type = TypeInfo::of::<ServiceA>().with_constructor(ConstructorInfo::new(
        vec![ParameterInfo::new("logger", TypeRef::named("ILogger"))],
        |args: &Arguments| {
            let logger = args.get::<Arc<dyn Logger>>(0)?;
            let service_a: Arc<dyn BusinessService> = Arc::new(ServiceA {
                logger: (*logger).clone(),
            });
            Ok(service(service_a))
        },
    ));

    container
        .registry()
        .register_singleton(TypeRef::named("ILogger"), logger_type)
        .unwrap()
        .register_transient(TypeRef::named("IService"), service_type)
        .unwrap();
}

#[test]
fn test_logger_and_service_scenario() {
    init_test_logging();

    let container = CompositionContainer::new();
    register_scenario(&container);

    let first = container
        .resolve::<Arc<dyn BusinessService>>(&TypeRef::named("IService"))
        .unwrap();
    let second = container
        .resolve::<Arc<dyn BusinessService>>(&TypeRef::named("IService"))
        .unwrap();

    // 两个不同的 ServiceA 共享同一个 ConsoleLogger
    assert!(!Arc::ptr_eq(&*first, &*second));
    assert!(Arc::ptr_eq(first.logger(), second.logger()));

    assert_eq!(first.run(), "A");
    assert_eq!(second.run(), "A");
    let logger = container
        .resolve::<Arc<dyn Logger>>(&TypeRef::named("ILogger"))
        .unwrap();
    assert_eq!(logger.lines().len(), 2);

    let stats = container.stats();
    assert_eq!(stats.singleton_cache_misses, 1);
    assert_eq!(stats.transient_creations, 2);
    assert_eq!(stats.registered_services, 2);
}

#[test]
fn test_scenario_through_wrappers() {
    init_test_logging();

    let container = CompositionContainer::new();
    register_scenario(&container);

    let services = container
        .resolve::<ServiceList>(&TypeRef::list(TypeRef::named("IService")))
        .unwrap();
    assert_eq!(services.len(), 1);
    let service_a = services.downcast_all::<Arc<dyn BusinessService>>().unwrap();
    assert_eq!(service_a[0].run(), "A");
}

#[test]
fn test_configured_sources_limit_wrappers() {
    init_test_logging();

    let mut config = CompositionConfig::from_toml_str(
        r#"
        default_sources = ["enumerable"]
        trace_resolution = true
        "#,
    )
    .unwrap();
    config
        .apply_env_overrides(&HashMap::from([(
            "KEPHAS_COMPOSITION_DEFAULT_SOURCES".to_string(),
            "enumerable,lazy".to_string(),
        )]))
        .unwrap();

    let container = CompositionContainer::with_config(config);
    register_scenario(&container);

    assert!(container
        .get_export(&TypeRef::lazy(TypeRef::named("ILogger")))
        .is_ok());
    assert!(container
        .try_get_export(&TypeRef::export_factory(TypeRef::named("ILogger")))
        .unwrap()
        .is_none());
    assert_eq!(
        container.config().default_sources,
        vec![SourceKind::Enumerable, SourceKind::Lazy]
    );
}

#[test]
fn test_resolver_outliving_container() {
    init_test_logging();

    let resolver = {
        let container = CompositionContainer::new();
        register_scenario(&container);
        container.resolver()
    };

    let err = resolver
        .get_required_service(&TypeRef::named("IService"))
        .unwrap_err();
    assert!(matches!(err, CompositionError::ResolverDisposed));
    err.log();
}
