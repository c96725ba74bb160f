//! 容器统计信息

use std::sync::atomic::{AtomicU64, Ordering};

/// 内部统计（原子计数器），由同一容器的所有解析器共享
#[derive(Debug, Default)]
pub(crate) struct ResolutionStats {
    total_resolutions: AtomicU64,
    singleton_cache_hits: AtomicU64,
    singleton_cache_misses: AtomicU64,
    transient_creations: AtomicU64,
    source_resolutions: AtomicU64,
    generic_closings: AtomicU64,
}

impl ResolutionStats {
    pub(crate) fn record_resolution(&self) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_singleton_hit(&self) {
        self.singleton_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_singleton_miss(&self) {
        self.singleton_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transient_creation(&self) {
        self.transient_creations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_source_resolution(&self) {
        self.source_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_generic_closing(&self) {
        self.generic_closings.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, registered_services: usize) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            singleton_cache_hits: self.singleton_cache_hits.load(Ordering::Relaxed),
            singleton_cache_misses: self.singleton_cache_misses.load(Ordering::Relaxed),
            transient_creations: self.transient_creations.load(Ordering::Relaxed),
            source_resolutions: self.source_resolutions.load(Ordering::Relaxed),
            generic_closings: self.generic_closings.load(Ordering::Relaxed),
            registered_services,
        }
    }
}

/// 容器统计信息快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 总解析次数（包括构造函数参数与包装内部的递归解析）
    pub total_resolutions: u64,
    /// 单例缓存命中次数
    pub singleton_cache_hits: u64,
    /// 单例缓存未命中次数（即单例实际创建次数）
    pub singleton_cache_misses: u64,
    /// 瞬态服务创建次数
    pub transient_creations: u64,
    /// 由服务源合成的解析次数
    pub source_resolutions: u64,
    /// 开放泛型封闭次数
    pub generic_closings: u64,
    /// 已注册的顶层契约数量
    pub registered_services: usize,
}

impl ContainerStats {
    /// 获取缓存命中率（百分比）
    pub fn cache_hit_rate(&self) -> f64 {
        self.hit_rate() * 100.0
    }

    /// 获取缓存命中率（小数形式）
    pub fn hit_rate(&self) -> f64 {
        let total = self.singleton_cache_hits + self.singleton_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.singleton_cache_hits as f64 / total as f64
        }
    }

    /// 获取性能指标摘要
    pub fn performance_summary(&self) -> String {
        format!(
            "Container Performance: {} total resolutions, {:.1}% cache hit rate, {} registered services, {} transient creations",
            self.total_resolutions,
            self.cache_hit_rate(),
            self.registered_services,
            self.transient_creations
        )
    }
}
