//! 构造函数选择与调用
//!
//! 选择规则：
//! 1. 公共构造函数按参数个数降序稳定排序
//! 2. 一旦找到可完全解析的候选，遇到更短的候选即停止
//! 3. 同长度出现第二个可完全解析的候选时报告歧义
//! 4. 没有可用候选时报告所有未能解析的必需参数

use super::reflection::{Arguments, ConstructorInfo, TypeInfo};
use super::resolver::ResolverEngine;
use super::types::{Service, TypeRef};
use crate::errors::{CompositionError, Result};
use std::collections::BTreeSet;

/// 选定的构造函数，按描述符缓存
#[derive(Debug)]
pub(crate) struct ResolvedConstructor {
    implementation: TypeRef,
    constructor: ConstructorInfo,
}

impl ResolvedConstructor {
    pub(crate) fn select(implementation: &TypeInfo, engine: &ResolverEngine) -> Result<Self> {
        let mut candidates: Vec<&ConstructorInfo> = implementation.public_constructors().collect();
        candidates.sort_by(|a, b| b.parameters().len().cmp(&a.parameters().len()));

        let mut best: Option<&ConstructorInfo> = None;
        let mut unresolved = BTreeSet::new();

        for candidate in candidates {
            if let Some(current) = best {
                if candidate.parameters().len() < current.parameters().len() {
                    break;
                }
            }

            let mut missing = Vec::new();
            for parameter in candidate.parameters() {
                if !parameter.has_default() && !engine.is_registered(parameter.parameter_type())? {
                    missing.push(parameter.to_string());
                }
            }

            if !missing.is_empty() {
                unresolved.extend(missing);
                continue;
            }

            if let Some(current) = best {
                return Err(CompositionError::AmbiguousConstructor {
                    implementation: implementation.type_ref().clone(),
                    first: current.signature(),
                    second: candidate.signature(),
                });
            }
            best = Some(candidate);
        }

        match best {
            Some(constructor) => {
                tracing::trace!(
                    implementation = %implementation.type_ref(),
                    constructor = %constructor.signature(),
                    "Selected constructor"
                );
                Ok(Self {
                    implementation: implementation.type_ref().clone(),
                    constructor: constructor.clone(),
                })
            }
            None => Err(CompositionError::MissingConstructor {
                implementation: implementation.type_ref().clone(),
                unresolved: unresolved.into_iter().collect(),
            }),
        }
    }

    /// 解析参数并调用构造函数
    ///
    /// 可选参数先尝试解析，未注册时取默认值；必需参数走必需解析。
    pub(crate) fn invoke(&self, engine: &ResolverEngine) -> Result<Service> {
        let mut values = Vec::with_capacity(self.constructor.parameters().len());
        for parameter in self.constructor.parameters() {
            let value = if parameter.has_default() {
                match engine.get_service(parameter.parameter_type())? {
                    Some(value) => Some(value),
                    None => parameter.default_value(),
                }
            } else {
                Some(engine.get_required_service(parameter.parameter_type())?)
            };
            values.push(value);
        }

        self.constructor
            .invoke(&Arguments::new(values))
            .map_err(|err| match err {
                CompositionError::TypeMismatch { .. } => CompositionError::activation(
                    self.implementation.to_string(),
                    err.to_string(),
                ),
                other => other,
            })
    }
}
