//! 按 frame-in-flight 复制的资源
//!
//! 频繁更新的资源把物理存储复制 N 份（N = frames-in-flight），每个帧索引
//! 拥有互不相交的一段区间；CPU 只写当前帧的那一段，GPU 读的是之前帧的，
//! 二者在空间上就分开了，时间上的分隔由 fence 等待保证。静态资源不复制。

use basalt_gfx::backend::{GfxBackend, GfxError};
use basalt_gfx::descs::{GfxBufferDesc, GfxBufferUsage, GfxDescriptorSetDesc, GfxDescriptorWrite, GfxMemoryUsage};
use basalt_gfx::ids::{GfxBufferId, GfxDescriptorSetId};

/// buffer 的创建描述
#[derive(Clone, Debug)]
pub struct FifBufferDesc {
    /// 单帧可见的逻辑大小；物理大小是它的 replication 倍
    pub logical_size: u64,
    pub usage: GfxBufferUsage,
    pub frequently_updated: bool,
    pub fif_count: u32,
    pub debug_name: String,
}

impl FifBufferDesc {
    pub fn vertex(vertex_count: u64, vertex_size: u64, frequently_updated: bool, fif_count: u32, name: &str) -> Self {
        Self {
            logical_size: vertex_count * vertex_size,
            usage: GfxBufferUsage::VERTEX,
            frequently_updated,
            fif_count,
            debug_name: name.to_string(),
        }
    }

    pub fn index(index_count: u64, index_size: u64, frequently_updated: bool, fif_count: u32, name: &str) -> Self {
        Self {
            logical_size: index_count * index_size,
            usage: GfxBufferUsage::INDEX,
            frequently_updated,
            fif_count,
            debug_name: name.to_string(),
        }
    }

    pub fn uniform(size: u64, frequently_updated: bool, fif_count: u32, name: &str) -> Self {
        Self {
            logical_size: size,
            usage: GfxBufferUsage::UNIFORM,
            frequently_updated,
            fif_count,
            debug_name: name.to_string(),
        }
    }
}

/// 多缓冲 buffer
///
/// # Destroy
/// 需要在释放 handle 之前调用 [`FifBuffer::destroy`] 归还后端存储。
pub struct FifBuffer {
    buffer: GfxBufferId,
    logical_size: u64,
    /// 1（静态）或 fif_count（频繁更新）
    replication: u32,
    frequently_updated: bool,

    #[cfg(debug_assertions)]
    destroyed: bool,
}

// new & init
impl FifBuffer {
    pub fn create(backend: &mut impl GfxBackend, desc: &FifBufferDesc) -> Result<Self, GfxError> {
        debug_assert!(desc.fif_count > 0);
        let replication = if desc.frequently_updated { desc.fif_count } else { 1 };

        let buffer = backend.create_buffer(&GfxBufferDesc {
            size: desc.logical_size * replication as u64,
            usage: desc.usage,
            memory_usage: if desc.frequently_updated {
                GfxMemoryUsage::CpuToGpu
            } else {
                GfxMemoryUsage::GpuOnly
            },
            debug_name: desc.debug_name.clone(),
        })?;

        Ok(Self {
            buffer,
            logical_size: desc.logical_size,
            replication,
            frequently_updated: desc.frequently_updated,

            #[cfg(debug_assertions)]
            destroyed: false,
        })
    }

    pub fn destroy(self, backend: &mut impl GfxBackend) {
        backend.destroy_buffer(self.buffer);
        #[cfg(debug_assertions)]
        {
            let mut this = self;
            this.destroyed = true;
        }
    }
}
impl Drop for FifBuffer {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed, "FifBuffer dropped without destroy()");
    }
}

// write & bind
impl FifBuffer {
    /// 把 data 写入当前帧的切片
    ///
    /// 每个帧索引拥有互不相交的物理区间，所以这里不需要任何运行时检查
    /// 就不会覆盖 GPU 还在读的数据。
    pub fn write(&self, backend: &mut impl GfxBackend, local_offset: u64, data: &[u8], frame_index: u32) {
        debug_assert!(local_offset + data.len() as u64 <= self.logical_size);
        backend.update_buffer(self.buffer, self.bind_offset(local_offset, frame_index), data);
    }

    /// 绑定/写入共用的物理 offset 公式
    #[inline]
    pub fn bind_offset(&self, local_offset: u64, frame_index: u32) -> u64 {
        debug_assert!(local_offset <= self.logical_size);
        let slice = if self.frequently_updated { frame_index } else { 0 };
        debug_assert!(slice < self.replication);
        self.logical_size * slice as u64 + local_offset
    }
}

// getters
impl FifBuffer {
    #[inline]
    pub fn buffer_id(&self) -> GfxBufferId {
        self.buffer
    }

    #[inline]
    pub fn logical_size(&self) -> u64 {
        self.logical_size
    }

    #[inline]
    pub fn frequently_updated(&self) -> bool {
        self.frequently_updated
    }
}

/// descriptor set 的更新频率，决定是否按帧复制
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateFrequency {
    Never,
    PerFrame,
    PerBatch,
    PerDraw,
}

#[derive(Clone, Debug)]
pub struct FifDescriptorSetDesc {
    /// 每帧可见的 set 数量
    pub max_sets: u32,
    pub update_frequency: UpdateFrequency,
    pub fif_count: u32,
    pub debug_name: String,
}

/// 多缓冲 descriptor set
///
/// 按帧复制时后端实际分配 `max_sets * fif_count` 个 set，
/// 帧 i 的活动区间是 `[i * max_sets, (i + 1) * max_sets)`。
///
/// # Destroy
/// 同 [`FifBuffer`]，释放 handle 前先 destroy。
pub struct FifDescriptorSet {
    set: GfxDescriptorSetId,
    max_sets_per_frame: u32,
    replication: u32,

    #[cfg(debug_assertions)]
    destroyed: bool,
}

// new & init
impl FifDescriptorSet {
    pub fn create(backend: &mut impl GfxBackend, desc: &FifDescriptorSetDesc) -> Result<Self, GfxError> {
        debug_assert!(desc.fif_count > 0);
        let replication = if desc.update_frequency == UpdateFrequency::Never { 1 } else { desc.fif_count };

        let set = backend.create_descriptor_set(&GfxDescriptorSetDesc {
            max_sets: desc.max_sets * replication,
            debug_name: desc.debug_name.clone(),
        })?;

        Ok(Self {
            set,
            max_sets_per_frame: desc.max_sets,
            replication,

            #[cfg(debug_assertions)]
            destroyed: false,
        })
    }

    pub fn destroy(self, backend: &mut impl GfxBackend) {
        backend.destroy_descriptor_set(self.set);
        #[cfg(debug_assertions)]
        {
            let mut this = self;
            this.destroyed = true;
        }
    }
}
impl Drop for FifDescriptorSet {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed, "FifDescriptorSet dropped without destroy()");
    }
}

// update & bind
impl FifDescriptorSet {
    /// 帧内 set 下标到后端 set 下标的映射
    #[inline]
    pub fn resolve_set_index(&self, set_index: u32, frame_index: u32) -> u32 {
        debug_assert!(set_index < self.max_sets_per_frame);
        self.set_index_offset(frame_index) + set_index
    }

    #[inline]
    fn set_index_offset(&self, frame_index: u32) -> u32 {
        if self.replication == 1 {
            return 0;
        }
        debug_assert!(frame_index < self.replication);
        frame_index * self.max_sets_per_frame
    }

    /// 更新当前帧区间内的一个 set
    pub fn update(
        &self,
        backend: &mut impl GfxBackend,
        set_index: u32,
        writes: &[GfxDescriptorWrite],
        frame_index: u32,
    ) {
        backend.update_descriptor_set(self.set, self.resolve_set_index(set_index, frame_index), writes);
    }
}

// getters
impl FifDescriptorSet {
    #[inline]
    pub fn set_id(&self) -> GfxDescriptorSetId {
        self.set
    }

    #[inline]
    pub fn max_sets_per_frame(&self) -> u32 {
        self.max_sets_per_frame
    }

    #[inline]
    pub fn replication(&self) -> u32 {
        self.replication
    }
}
