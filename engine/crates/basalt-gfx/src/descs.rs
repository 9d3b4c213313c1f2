//! 后端资源的创建描述

use bitflags::bitflags;

use crate::ids::{GfxBufferId, GfxSamplerId, GfxTextureId};

bitflags! {
    /// buffer 的用途，决定后端如何创建 descriptor view
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct GfxBufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
    }
}

/// buffer 的内存驻留位置
///
/// 频繁更新的 buffer 需要 CPU 可见的内存，静态 buffer 只留在 GPU 上。
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxMemoryUsage {
    GpuOnly,
    CpuToGpu,
}

#[derive(Clone, Debug)]
pub struct GfxBufferDesc {
    pub size: u64,
    pub usage: GfxBufferUsage,
    pub memory_usage: GfxMemoryUsage,
    pub debug_name: String,
}

/// 像素格式，只建模这个核心需要区分的几种
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxFormat {
    Bgra8Unorm,
    Rgba8Unorm,
    Depth32Float,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxQueueKind {
    Graphics,
    Compute,
    Blit,
}

#[derive(Clone, Debug)]
pub struct GfxSwapchainDesc {
    /// 平台相关的 window handle（HWND 等），核心层不解释
    pub platform_handle: u64,
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
    pub color_format: GfxFormat,
    pub vsync: bool,
}

#[derive(Clone, Debug)]
pub struct GfxRenderTargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: GfxFormat,
    pub debug_name: String,
}

#[derive(Clone, Debug)]
pub struct GfxDescriptorSetDesc {
    /// 后端实际分配的 set 数量（已含 per-frame 复制）
    pub max_sets: u32,
    pub debug_name: String,
}

/// 对 descriptor set 中某个 binding 的一次写入
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GfxDescriptorWrite {
    Buffer {
        binding: u32,
        buffer: GfxBufferId,
        /// 物理 offset，调用方负责算好 per-frame 的切片
        offset: u64,
        size: u64,
    },
    Texture {
        binding: u32,
        texture: GfxTextureId,
    },
    Sampler {
        binding: u32,
        sampler: GfxSamplerId,
    },
}
