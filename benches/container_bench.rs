#![allow(clippy::uninlined_format_args)]
//! 组合容器的性能基准测试

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kephas_composition::composition::{
    ConstructorInfo, ParameterInfo, ServiceInfo, ServiceList, TypeInfo, TypeRef,
};
use kephas_composition::{service, CompositionContainer, ServiceLifetime};

struct SimpleService {
    value: i32,
}

struct DependentService {
    dependency: std::sync::Arc<SimpleService>,
}

fn simple_type() -> TypeInfo {
    TypeInfo::of::<SimpleService>().with_constructor(ConstructorInfo::parameterless(|| {
        Ok(service(SimpleService { value: 42 }))
    }))
}

fn dependent_type() -> TypeInfo {
    TypeInfo::of::<DependentService>().with_constructor(ConstructorInfo::new(
        vec![ParameterInfo::new("dependency", TypeRef::named("ISimple"))],
        |args| {
            Ok(service(DependentService {
                dependency: args.get::<SimpleService>(0)?,
            }))
        },
    ))
}

/// 基准测试：单例缓存命中
fn bench_singleton_resolution(c: &mut Criterion) {
    let container = CompositionContainer::new();
    container
        .registry()
        .register_singleton(TypeRef::named("ISimple"), simple_type())
        .unwrap();
    let contract = TypeRef::named("ISimple");

    c.bench_function("singleton_resolution", |b| {
        b.iter(|| {
            let resolved = container.resolve::<SimpleService>(black_box(&contract)).unwrap();
            black_box(resolved.value);
        })
    });
}

/// 基准测试：瞬态服务 + 构造函数注入
fn bench_transient_with_dependency(c: &mut Criterion) {
    let container = CompositionContainer::new();
    container
        .registry()
        .register_singleton(TypeRef::named("ISimple"), simple_type())
        .unwrap()
        .register_transient(TypeRef::named("IDependent"), dependent_type())
        .unwrap();
    let contract = TypeRef::named("IDependent");

    c.bench_function("transient_with_dependency", |b| {
        b.iter(|| {
            let resolved = container.resolve::<DependentService>(black_box(&contract)).unwrap();
            black_box(resolved.dependency.value);
        })
    });
}

/// 基准测试：多重注册的集合解析
fn bench_enumerable_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerable_resolution");

    for count in [1_usize, 10, 100] {
        let container = CompositionContainer::new();
        for i in 0..count {
            container
                .register_service(
                    ServiceInfo::from_factory(TypeRef::named("IPlugin"), ServiceLifetime::Transient, move |_| {
                        Ok(service(SimpleService { value: i as i32 }))
                    })
                    .allow_multiple(true),
                )
                .unwrap();
        }
        let contract = TypeRef::enumerable(TypeRef::named("IPlugin"));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let list = container.resolve::<ServiceList>(black_box(&contract)).unwrap();
                assert_eq!(list.len(), count);
            })
        });
    }

    group.finish();
}

/// 基准测试：开放泛型（首次封闭之后走缓存）
fn bench_open_generic_resolution(c: &mut Criterion) {
    let container = CompositionContainer::new();
    let template = TypeInfo::generic_definition(TypeRef::definition("Repository", 1), |args| {
        let value = args.len() as i32;
        Ok(TypeInfo::new(TypeRef::named("Repository"))
            .with_constructor(ConstructorInfo::parameterless(move || Ok(service(SimpleService { value })))))
    });
    container
        .registry()
        .register_transient(TypeRef::definition("IRepository", 1), template)
        .unwrap();
    let contract = TypeRef::generic("IRepository", [TypeRef::named("User")]);

    c.bench_function("open_generic_resolution", |b| {
        b.iter(|| {
            let resolved = container.resolve::<SimpleService>(black_box(&contract)).unwrap();
            black_box(resolved.value);
        })
    });

    println!("{}", container.stats().performance_summary());
}

criterion_group!(
    benches,
    bench_singleton_resolution,
    bench_transient_with_dependency,
    bench_enumerable_resolution,
    bench_open_generic_resolution
);
criterion_main!(benches);
