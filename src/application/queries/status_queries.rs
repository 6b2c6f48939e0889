//! Status Queries - 运行状态侧

/// 列出已注册合成后端查询
#[derive(Debug, Clone)]
pub struct ListBackends;

/// 获取渲染缓存统计查询
#[derive(Debug, Clone)]
pub struct GetCacheStats;
