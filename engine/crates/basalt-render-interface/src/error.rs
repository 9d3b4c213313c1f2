//! 渲染核心的错误分类

use basalt_gfx::backend::GfxError;
use thiserror::Error;

/// 核心操作可能的失败方式
///
/// - 过期 handle 属于调用方 bug：防御路径返回本错误，
///   致命路径（`resolve`）直接 panic；
/// - pool 用尽对可增长的 pool 不会发生，固定 pool 用尽后调用方可以
///   释放资源再重试；
/// - 后端错误不在核心内重试，一律传播到创建/调用点。
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid handle passed to {op}")]
    InvalidHandle { op: &'static str },

    #[error("handle pool `{kind}` exhausted")]
    PoolExhausted { kind: &'static str },

    #[error("backend call failed: {0}")]
    Backend(#[from] GfxError),

    /// fence/队列等待报告设备丢失
    #[error("device not ready")]
    DeviceNotReady,
}

pub type RenderResult<T> = Result<T, RenderError>;
