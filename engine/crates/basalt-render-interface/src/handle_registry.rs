//! 按资源种类组织的 handle pool 集合

use std::cell::RefCell;
use std::rc::Rc;

use basalt_gfx::descs::GfxQueueKind;
use basalt_gfx::ids::{GfxCommandListId, GfxPipelineId, GfxQueueId, GfxSamplerId, GfxShaderId, GfxTextureId};

use crate::fif_buffer::{FifBuffer, FifDescriptorSet};
use crate::frame_synchronizer::FrameSynchronizer;
use crate::handle_pool::HandlePool;
use crate::handles::Handle;

/// 注册进 pool 的外部创建资源：texture
///
/// texture/pipeline/shader/sampler 的创建属于后端的职责，核心只负责
/// 给它们发放带校验的 handle。
pub struct TextureResource {
    pub texture: GfxTextureId,
}

pub struct PipelineResource {
    pub pipeline: GfxPipelineId,
}

pub struct ShaderResource {
    pub shader: GfxShaderId,
}

pub struct SamplerResource {
    pub sampler: GfxSamplerId,
}

pub struct QueueResource {
    pub queue: GfxQueueId,
    pub kind: GfxQueueKind,
}

/// 图形命令的录制器，包装一条后端 command list
pub struct GraphicsEncoder {
    pub cmd: GfxCommandListId,
}

pub struct ComputeEncoder {
    pub cmd: GfxCommandListId,
}

pub struct BlitEncoder {
    pub cmd: GfxCommandListId,
}

pub type BufferHandle = Handle<FifBuffer>;
pub type TextureHandle = Handle<TextureResource>;
pub type PipelineHandle = Handle<PipelineResource>;
pub type DescriptorSetHandle = Handle<FifDescriptorSet>;
pub type ShaderHandle = Handle<ShaderResource>;
pub type SamplerHandle = Handle<SamplerResource>;
pub type FrameBufferHandle = Handle<FrameSynchronizer>;
pub type GraphicsEncoderHandle = Handle<GraphicsEncoder>;
pub type ComputeEncoderHandle = Handle<ComputeEncoder>;
pub type BlitEncoderHandle = Handle<BlitEncoder>;
pub type QueueHandle = Handle<QueueResource>;

#[derive(Copy, Clone, Debug)]
pub struct PoolSizing {
    pub capacity: u32,
    pub growable: bool,
}

/// 每类资源的 pool 尺寸
///
/// 高频种类（buffer/texture/pipeline/descriptor set/shader）初始容量大且
/// 可增长；低频种类（frame buffer/encoder/queue/sampler）容量小且固定。
#[derive(Copy, Clone, Debug)]
pub struct PoolSizingTable {
    pub buffers: PoolSizing,
    pub textures: PoolSizing,
    pub pipelines: PoolSizing,
    pub descriptor_sets: PoolSizing,
    pub shaders: PoolSizing,
    pub samplers: PoolSizing,
    pub frame_buffers: PoolSizing,
    pub graphics_encoders: PoolSizing,
    pub compute_encoders: PoolSizing,
    pub blit_encoders: PoolSizing,
    pub queues: PoolSizing,
}

impl Default for PoolSizingTable {
    fn default() -> Self {
        let high_volume = |capacity| PoolSizing {
            capacity,
            growable: true,
        };
        let low_volume = |capacity| PoolSizing {
            capacity,
            growable: false,
        };
        Self {
            buffers: high_volume(1024),
            textures: high_volume(1024),
            pipelines: high_volume(256),
            descriptor_sets: high_volume(1024),
            shaders: high_volume(256),
            samplers: low_volume(64),
            frame_buffers: low_volume(8),
            graphics_encoders: low_volume(16),
            compute_encoders: low_volume(16),
            blit_encoders: low_volume(16),
            queues: low_volume(4),
        }
    }
}

/// 资源 handle 的注册表，每类资源一个 pool
///
/// 不是全局单例：注册表是调用方持有的值，多个 renderer 通过
/// `Rc<RefCell<_>>` 共享同一份，`Rc` 的强引用计数就充当 renderer 数量的
/// 引用计数，最后一个 drop 时各 pool 的空置断言会执行。
pub struct HandleRegistry {
    buffers: HandlePool<FifBuffer>,
    textures: HandlePool<TextureResource>,
    pipelines: HandlePool<PipelineResource>,
    descriptor_sets: HandlePool<FifDescriptorSet>,
    shaders: HandlePool<ShaderResource>,
    samplers: HandlePool<SamplerResource>,
    frame_buffers: HandlePool<FrameSynchronizer>,
    graphics_encoders: HandlePool<GraphicsEncoder>,
    compute_encoders: HandlePool<ComputeEncoder>,
    blit_encoders: HandlePool<BlitEncoder>,
    queues: HandlePool<QueueResource>,
}

// new & init
impl HandleRegistry {
    pub fn new(table: &PoolSizingTable) -> Self {
        log::info!("create handle registry");
        Self {
            buffers: HandlePool::new("buffers", table.buffers.capacity, table.buffers.growable),
            textures: HandlePool::new("textures", table.textures.capacity, table.textures.growable),
            pipelines: HandlePool::new("pipelines", table.pipelines.capacity, table.pipelines.growable),
            descriptor_sets: HandlePool::new(
                "descriptor-sets",
                table.descriptor_sets.capacity,
                table.descriptor_sets.growable,
            ),
            shaders: HandlePool::new("shaders", table.shaders.capacity, table.shaders.growable),
            samplers: HandlePool::new("samplers", table.samplers.capacity, table.samplers.growable),
            frame_buffers: HandlePool::new("frame-buffers", table.frame_buffers.capacity, table.frame_buffers.growable),
            graphics_encoders: HandlePool::new(
                "graphics-encoders",
                table.graphics_encoders.capacity,
                table.graphics_encoders.growable,
            ),
            compute_encoders: HandlePool::new(
                "compute-encoders",
                table.compute_encoders.capacity,
                table.compute_encoders.growable,
            ),
            blit_encoders: HandlePool::new("blit-encoders", table.blit_encoders.capacity, table.blit_encoders.growable),
            queues: HandlePool::new("queues", table.queues.capacity, table.queues.growable),
        }
    }

    /// 多个 renderer 共享时的便捷构造
    pub fn new_shared(table: &PoolSizingTable) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(table)))
    }
}

// 各种类 pool 的访问器；类型参数保证 handle 不会查错 pool
impl HandleRegistry {
    #[inline]
    pub fn buffers(&self) -> &HandlePool<FifBuffer> {
        &self.buffers
    }
    #[inline]
    pub fn buffers_mut(&mut self) -> &mut HandlePool<FifBuffer> {
        &mut self.buffers
    }

    #[inline]
    pub fn textures(&self) -> &HandlePool<TextureResource> {
        &self.textures
    }
    #[inline]
    pub fn textures_mut(&mut self) -> &mut HandlePool<TextureResource> {
        &mut self.textures
    }

    #[inline]
    pub fn pipelines(&self) -> &HandlePool<PipelineResource> {
        &self.pipelines
    }
    #[inline]
    pub fn pipelines_mut(&mut self) -> &mut HandlePool<PipelineResource> {
        &mut self.pipelines
    }

    #[inline]
    pub fn descriptor_sets(&self) -> &HandlePool<FifDescriptorSet> {
        &self.descriptor_sets
    }
    #[inline]
    pub fn descriptor_sets_mut(&mut self) -> &mut HandlePool<FifDescriptorSet> {
        &mut self.descriptor_sets
    }

    #[inline]
    pub fn shaders(&self) -> &HandlePool<ShaderResource> {
        &self.shaders
    }
    #[inline]
    pub fn shaders_mut(&mut self) -> &mut HandlePool<ShaderResource> {
        &mut self.shaders
    }

    #[inline]
    pub fn samplers(&self) -> &HandlePool<SamplerResource> {
        &self.samplers
    }
    #[inline]
    pub fn samplers_mut(&mut self) -> &mut HandlePool<SamplerResource> {
        &mut self.samplers
    }

    #[inline]
    pub fn frame_buffers(&self) -> &HandlePool<FrameSynchronizer> {
        &self.frame_buffers
    }
    #[inline]
    pub fn frame_buffers_mut(&mut self) -> &mut HandlePool<FrameSynchronizer> {
        &mut self.frame_buffers
    }

    #[inline]
    pub fn graphics_encoders(&self) -> &HandlePool<GraphicsEncoder> {
        &self.graphics_encoders
    }
    #[inline]
    pub fn graphics_encoders_mut(&mut self) -> &mut HandlePool<GraphicsEncoder> {
        &mut self.graphics_encoders
    }

    #[inline]
    pub fn compute_encoders(&self) -> &HandlePool<ComputeEncoder> {
        &self.compute_encoders
    }
    #[inline]
    pub fn compute_encoders_mut(&mut self) -> &mut HandlePool<ComputeEncoder> {
        &mut self.compute_encoders
    }

    #[inline]
    pub fn blit_encoders(&self) -> &HandlePool<BlitEncoder> {
        &self.blit_encoders
    }
    #[inline]
    pub fn blit_encoders_mut(&mut self) -> &mut HandlePool<BlitEncoder> {
        &mut self.blit_encoders
    }

    #[inline]
    pub fn queues(&self) -> &HandlePool<QueueResource> {
        &self.queues
    }
    #[inline]
    pub fn queues_mut(&mut self) -> &mut HandlePool<QueueResource> {
        &mut self.queues
    }
}

// tools
impl HandleRegistry {
    /// 所有 pool 都没有 live 资源
    pub fn is_empty(&self) -> bool {
        self.live_total() == 0
    }

    pub fn live_total(&self) -> u32 {
        self.buffers.live_count()
            + self.textures.live_count()
            + self.pipelines.live_count()
            + self.descriptor_sets.live_count()
            + self.shaders.live_count()
            + self.samplers.live_count()
            + self.frame_buffers.live_count()
            + self.graphics_encoders.live_count()
            + self.compute_encoders.live_count()
            + self.blit_encoders.live_count()
            + self.queues.live_count()
    }
}
