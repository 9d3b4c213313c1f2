//! Renderer 生命周期与按资源种类划分的操作

use std::cell::RefCell;
use std::rc::Rc;

use basalt_gfx::backend::GfxBackend;
use basalt_gfx::descs::{GfxDescriptorWrite, GfxFormat, GfxQueueKind};
use basalt_gfx::ids::{GfxPipelineId, GfxSamplerId, GfxShaderId, GfxTextureId};
use basalt_render_interface::error::{RenderError, RenderResult};
use basalt_render_interface::fif_buffer::{FifBuffer, FifBufferDesc, FifDescriptorSet, FifDescriptorSetDesc, UpdateFrequency};
use basalt_render_interface::frame_synchronizer::{FrameContext, FrameSynchronizer, FrameSynchronizerDesc};
use basalt_render_interface::handle_registry::{
    BlitEncoder, BlitEncoderHandle, BufferHandle, ComputeEncoder, ComputeEncoderHandle, DescriptorSetHandle,
    FrameBufferHandle, GraphicsEncoder, GraphicsEncoderHandle, HandleRegistry, PipelineHandle, PipelineResource,
    PoolSizingTable, QueueHandle, QueueResource, SamplerHandle, SamplerResource, ShaderHandle, ShaderResource,
    TextureHandle, TextureResource,
};

#[derive(Clone, Debug)]
pub struct RendererDesc {
    /// CPU 允许领先 GPU 的帧数，多缓冲资源按这个数量复制
    pub frames_in_flight: u32,
    pub pool_sizing: PoolSizingTable,
}

impl Default for RendererDesc {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            pool_sizing: PoolSizingTable::default(),
        }
    }
}

/// 创建 presentable surface 的参数
#[derive(Clone, Debug)]
pub struct FrameBufferDesc {
    pub platform_handle: u64,
    pub width: u32,
    pub height: u32,
    pub color_format: GfxFormat,
    pub depth_format: Option<GfxFormat>,
    pub vsync: bool,
}

/// descriptor set 的一次绑定，用 handle 表达
///
/// buffer 绑定里的 offset 是逻辑 offset，换算到当前帧的物理切片在
/// 更新时完成，和 [`FifBuffer::bind_offset`] 用同一套公式。
#[derive(Clone, Debug)]
pub enum DescriptorBinding {
    Buffer {
        binding: u32,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
    Texture {
        binding: u32,
        texture: TextureHandle,
    },
    Sampler {
        binding: u32,
        sampler: SamplerHandle,
    },
}

/// Renderer
///
/// 独占后端和三个主队列；handle 注册表可以被多个 renderer 共享
/// （`Rc` 强引用计数就是 renderer 引用计数）。所有操作都在单一渲染线程
/// 上进行，唯一的例外见 [`crate::visual_debug`]。
///
/// # Destroy
/// 用 [`Renderer::destroy`] 结束生命周期；它释放 renderer 自己注册的
/// handle 并归还后端。客户端创建的资源必须在这之前全部销毁，否则注册表
/// drop 时的空置断言会触发。
pub struct Renderer<B: GfxBackend> {
    backend: B,
    registry: Rc<RefCell<HandleRegistry>>,

    graphics_queue: QueueHandle,
    compute_queue: QueueHandle,
    blit_queue: QueueHandle,

    frames_in_flight: u32,
    /// 最近一次 new_frame 发布的帧索引，update/bind 都以它为准
    frame_index: u32,
}

// new & init
impl<B: GfxBackend> Renderer<B> {
    pub fn new(backend: B, desc: &RendererDesc) -> RenderResult<Self> {
        let registry = HandleRegistry::new_shared(&desc.pool_sizing);
        Self::with_registry(backend, desc, registry)
    }

    /// 与其他 renderer 共享同一个注册表
    pub fn with_registry(
        mut backend: B,
        desc: &RendererDesc,
        registry: Rc<RefCell<HandleRegistry>>,
    ) -> RenderResult<Self> {
        assert!(desc.frames_in_flight > 0);

        let mut alloc_queue = |kind| {
            let queue = backend.acquire_queue(kind);
            registry
                .borrow_mut()
                .queues_mut()
                .try_alloc(QueueResource { queue, kind })
                .map_err(|_| RenderError::PoolExhausted { kind: "queues" })
        };
        let graphics_queue = alloc_queue(GfxQueueKind::Graphics)?;
        let compute_queue = alloc_queue(GfxQueueKind::Compute)?;
        let blit_queue = alloc_queue(GfxQueueKind::Blit)?;

        log::info!("create renderer: {} frames in flight", desc.frames_in_flight);
        Ok(Self {
            backend,
            registry,
            graphics_queue,
            compute_queue,
            blit_queue,
            frames_in_flight: desc.frames_in_flight,
            frame_index: 0,
        })
    }
}

// destroy
impl<B: GfxBackend> Renderer<B> {
    /// 释放 renderer 注册的 handle，归还后端
    ///
    /// 注册表的空置断言在最后一个共享者 drop 时执行。
    pub fn destroy(self) -> B {
        let _span = tracy_client::span!("Renderer::destroy");
        {
            let mut registry = self.registry.borrow_mut();
            registry.queues_mut().release(self.blit_queue);
            registry.queues_mut().release(self.compute_queue);
            registry.queues_mut().release(self.graphics_queue);
        }
        self.backend
    }
}

// getters
impl<B: GfxBackend> Renderer<B> {
    #[inline]
    pub fn registry(&self) -> Rc<RefCell<HandleRegistry>> {
        self.registry.clone()
    }

    /// texture/pipeline 等外部资源的创建走这里，创建完再 register 进注册表
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    /// 最近一次 new_frame 发布的帧索引
    #[inline]
    pub fn current_frame_index(&self) -> u32 {
        self.frame_index
    }

    #[inline]
    pub fn primary_queue(&self, kind: GfxQueueKind) -> QueueHandle {
        match kind {
            GfxQueueKind::Graphics => self.graphics_queue,
            GfxQueueKind::Compute => self.compute_queue,
            GfxQueueKind::Blit => self.blit_queue,
        }
    }
}

// buffer
impl<B: GfxBackend> Renderer<B> {
    pub fn create_vertex_buffer(
        &mut self,
        vertex_count: u64,
        vertex_size: u64,
        frequently_updated: bool,
        name: &str,
    ) -> RenderResult<BufferHandle> {
        self.create_buffer(&FifBufferDesc::vertex(vertex_count, vertex_size, frequently_updated, self.frames_in_flight, name))
    }

    pub fn create_index_buffer(
        &mut self,
        index_count: u64,
        index_size: u64,
        frequently_updated: bool,
        name: &str,
    ) -> RenderResult<BufferHandle> {
        self.create_buffer(&FifBufferDesc::index(index_count, index_size, frequently_updated, self.frames_in_flight, name))
    }

    pub fn create_uniform_buffer(&mut self, size: u64, frequently_updated: bool, name: &str) -> RenderResult<BufferHandle> {
        self.create_buffer(&FifBufferDesc::uniform(size, frequently_updated, self.frames_in_flight, name))
    }

    fn create_buffer(&mut self, desc: &FifBufferDesc) -> RenderResult<BufferHandle> {
        let buffer = FifBuffer::create(&mut self.backend, desc)?;
        match self.registry.borrow_mut().buffers_mut().try_alloc(buffer) {
            Ok(handle) => Ok(handle),
            Err(buffer) => {
                buffer.destroy(&mut self.backend);
                Err(RenderError::PoolExhausted { kind: "buffers" })
            }
        }
    }

    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> RenderResult<()> {
        let buffer = self
            .registry
            .borrow_mut()
            .buffers_mut()
            .release(handle)
            .ok_or(RenderError::InvalidHandle { op: "destroy_buffer" })?;
        buffer.destroy(&mut self.backend);
        Ok(())
    }

    /// 写入当前帧的切片
    pub fn update_buffer(&mut self, handle: BufferHandle, local_offset: u64, data: &[u8]) -> RenderResult<()> {
        let registry = self.registry.borrow();
        let buffer = registry.buffers().get(handle).ok_or(RenderError::InvalidHandle { op: "update_buffer" })?;
        buffer.write(&mut self.backend, local_offset, data, self.frame_index);
        Ok(())
    }

    /// 绑定 vertex/index/uniform buffer 时应使用的物理 offset
    pub fn buffer_bind_offset(&self, handle: BufferHandle, local_offset: u64) -> RenderResult<u64> {
        let registry = self.registry.borrow();
        let buffer = registry.buffers().get(handle).ok_or(RenderError::InvalidHandle { op: "buffer_bind_offset" })?;
        Ok(buffer.bind_offset(local_offset, self.frame_index))
    }

    #[inline]
    pub fn is_buffer_valid(&self, handle: BufferHandle) -> bool {
        self.registry.borrow().buffers().is_valid(handle)
    }
}

// descriptor set
impl<B: GfxBackend> Renderer<B> {
    pub fn create_descriptor_set(
        &mut self,
        max_sets: u32,
        update_frequency: UpdateFrequency,
        name: &str,
    ) -> RenderResult<DescriptorSetHandle> {
        let set = FifDescriptorSet::create(
            &mut self.backend,
            &FifDescriptorSetDesc {
                max_sets,
                update_frequency,
                fif_count: self.frames_in_flight,
                debug_name: name.to_string(),
            },
        )?;
        match self.registry.borrow_mut().descriptor_sets_mut().try_alloc(set) {
            Ok(handle) => Ok(handle),
            Err(set) => {
                set.destroy(&mut self.backend);
                Err(RenderError::PoolExhausted { kind: "descriptor-sets" })
            }
        }
    }

    pub fn destroy_descriptor_set(&mut self, handle: DescriptorSetHandle) -> RenderResult<()> {
        let set = self
            .registry
            .borrow_mut()
            .descriptor_sets_mut()
            .release(handle)
            .ok_or(RenderError::InvalidHandle { op: "destroy_descriptor_set" })?;
        set.destroy(&mut self.backend);
        Ok(())
    }

    /// 更新当前帧区间内的一个 set
    pub fn update_descriptor_set(
        &mut self,
        handle: DescriptorSetHandle,
        set_index: u32,
        bindings: &[DescriptorBinding],
    ) -> RenderResult<()> {
        self.descriptor_update(handle, set_index, bindings, self.frame_index)
    }

    /// 一次把每个 frame-in-flight 的 set 区间都填好
    ///
    /// 绑定内容不随帧变化时（静态 texture/sampler、每帧只换切片的
    /// uniform），预填之后就不需要逐帧 update 了。
    pub fn preset_descriptor_set(
        &mut self,
        handle: DescriptorSetHandle,
        set_index: u32,
        bindings: &[DescriptorBinding],
    ) -> RenderResult<()> {
        let replication = {
            let registry = self.registry.borrow();
            registry
                .descriptor_sets()
                .get(handle)
                .ok_or(RenderError::InvalidHandle { op: "preset_descriptor_set" })?
                .replication()
        };
        for frame_index in 0..replication {
            self.descriptor_update(handle, set_index, bindings, frame_index)?;
        }
        Ok(())
    }

    fn descriptor_update(
        &mut self,
        handle: DescriptorSetHandle,
        set_index: u32,
        bindings: &[DescriptorBinding],
        frame_index: u32,
    ) -> RenderResult<()> {
        let registry = self.registry.borrow();
        let set = registry
            .descriptor_sets()
            .get(handle)
            .ok_or(RenderError::InvalidHandle { op: "update_descriptor_set" })?;

        let mut writes = Vec::with_capacity(bindings.len());
        for binding in bindings {
            writes.push(match binding {
                DescriptorBinding::Buffer {
                    binding,
                    buffer,
                    offset,
                    size,
                } => {
                    let buffer = registry
                        .buffers()
                        .get(*buffer)
                        .ok_or(RenderError::InvalidHandle { op: "update_descriptor_set" })?;
                    GfxDescriptorWrite::Buffer {
                        binding: *binding,
                        buffer: buffer.buffer_id(),
                        // 绑定和写入必须对切片达成一致
                        offset: buffer.bind_offset(*offset, frame_index),
                        size: *size,
                    }
                }
                DescriptorBinding::Texture { binding, texture } => {
                    let texture = registry
                        .textures()
                        .get(*texture)
                        .ok_or(RenderError::InvalidHandle { op: "update_descriptor_set" })?;
                    GfxDescriptorWrite::Texture {
                        binding: *binding,
                        texture: texture.texture,
                    }
                }
                DescriptorBinding::Sampler { binding, sampler } => {
                    let sampler = registry
                        .samplers()
                        .get(*sampler)
                        .ok_or(RenderError::InvalidHandle { op: "update_descriptor_set" })?;
                    GfxDescriptorWrite::Sampler {
                        binding: *binding,
                        sampler: sampler.sampler,
                    }
                }
            });
        }

        set.update(&mut self.backend, set_index, &writes, frame_index);
        Ok(())
    }
}

// 注册外部创建的资源
impl<B: GfxBackend> Renderer<B> {
    pub fn register_texture(&mut self, texture: GfxTextureId) -> RenderResult<TextureHandle> {
        self.registry
            .borrow_mut()
            .textures_mut()
            .try_alloc(TextureResource { texture })
            .map_err(|_| RenderError::PoolExhausted { kind: "textures" })
    }

    pub fn release_texture(&mut self, handle: TextureHandle) -> RenderResult<()> {
        self.registry
            .borrow_mut()
            .textures_mut()
            .release(handle)
            .map(|_| ())
            .ok_or(RenderError::InvalidHandle { op: "release_texture" })
    }

    pub fn register_pipeline(&mut self, pipeline: GfxPipelineId) -> RenderResult<PipelineHandle> {
        self.registry
            .borrow_mut()
            .pipelines_mut()
            .try_alloc(PipelineResource { pipeline })
            .map_err(|_| RenderError::PoolExhausted { kind: "pipelines" })
    }

    pub fn release_pipeline(&mut self, handle: PipelineHandle) -> RenderResult<()> {
        self.registry
            .borrow_mut()
            .pipelines_mut()
            .release(handle)
            .map(|_| ())
            .ok_or(RenderError::InvalidHandle { op: "release_pipeline" })
    }

    pub fn register_shader(&mut self, shader: GfxShaderId) -> RenderResult<ShaderHandle> {
        self.registry
            .borrow_mut()
            .shaders_mut()
            .try_alloc(ShaderResource { shader })
            .map_err(|_| RenderError::PoolExhausted { kind: "shaders" })
    }

    pub fn release_shader(&mut self, handle: ShaderHandle) -> RenderResult<()> {
        self.registry
            .borrow_mut()
            .shaders_mut()
            .release(handle)
            .map(|_| ())
            .ok_or(RenderError::InvalidHandle { op: "release_shader" })
    }

    pub fn register_sampler(&mut self, sampler: GfxSamplerId) -> RenderResult<SamplerHandle> {
        self.registry
            .borrow_mut()
            .samplers_mut()
            .try_alloc(SamplerResource { sampler })
            .map_err(|_| RenderError::PoolExhausted { kind: "samplers" })
    }

    pub fn release_sampler(&mut self, handle: SamplerHandle) -> RenderResult<()> {
        self.registry
            .borrow_mut()
            .samplers_mut()
            .release(handle)
            .map(|_| ())
            .ok_or(RenderError::InvalidHandle { op: "release_sampler" })
    }
}

// encoder
impl<B: GfxBackend> Renderer<B> {
    pub fn create_graphics_encoder(&mut self) -> RenderResult<GraphicsEncoderHandle> {
        let queue = self.registry.borrow().queues().resolve(self.graphics_queue).queue;
        let cmd = self.backend.create_command_list(queue)?;
        match self.registry.borrow_mut().graphics_encoders_mut().try_alloc(GraphicsEncoder { cmd }) {
            Ok(handle) => Ok(handle),
            Err(encoder) => {
                self.backend.destroy_command_list(encoder.cmd);
                Err(RenderError::PoolExhausted { kind: "graphics-encoders" })
            }
        }
    }

    pub fn destroy_graphics_encoder(&mut self, handle: GraphicsEncoderHandle) -> RenderResult<()> {
        let encoder = self
            .registry
            .borrow_mut()
            .graphics_encoders_mut()
            .release(handle)
            .ok_or(RenderError::InvalidHandle { op: "destroy_graphics_encoder" })?;
        self.backend.destroy_command_list(encoder.cmd);
        Ok(())
    }

    pub fn create_compute_encoder(&mut self) -> RenderResult<ComputeEncoderHandle> {
        let queue = self.registry.borrow().queues().resolve(self.compute_queue).queue;
        let cmd = self.backend.create_command_list(queue)?;
        match self.registry.borrow_mut().compute_encoders_mut().try_alloc(ComputeEncoder { cmd }) {
            Ok(handle) => Ok(handle),
            Err(encoder) => {
                self.backend.destroy_command_list(encoder.cmd);
                Err(RenderError::PoolExhausted { kind: "compute-encoders" })
            }
        }
    }

    pub fn destroy_compute_encoder(&mut self, handle: ComputeEncoderHandle) -> RenderResult<()> {
        let encoder = self
            .registry
            .borrow_mut()
            .compute_encoders_mut()
            .release(handle)
            .ok_or(RenderError::InvalidHandle { op: "destroy_compute_encoder" })?;
        self.backend.destroy_command_list(encoder.cmd);
        Ok(())
    }

    pub fn create_blit_encoder(&mut self) -> RenderResult<BlitEncoderHandle> {
        let queue = self.registry.borrow().queues().resolve(self.blit_queue).queue;
        let cmd = self.backend.create_command_list(queue)?;
        match self.registry.borrow_mut().blit_encoders_mut().try_alloc(BlitEncoder { cmd }) {
            Ok(handle) => Ok(handle),
            Err(encoder) => {
                self.backend.destroy_command_list(encoder.cmd);
                Err(RenderError::PoolExhausted { kind: "blit-encoders" })
            }
        }
    }

    pub fn destroy_blit_encoder(&mut self, handle: BlitEncoderHandle) -> RenderResult<()> {
        let encoder = self
            .registry
            .borrow_mut()
            .blit_encoders_mut()
            .release(handle)
            .ok_or(RenderError::InvalidHandle { op: "destroy_blit_encoder" })?;
        self.backend.destroy_command_list(encoder.cmd);
        Ok(())
    }
}

// frame buffer 与每帧循环
impl<B: GfxBackend> Renderer<B> {
    pub fn create_frame_buffer(&mut self, desc: &FrameBufferDesc) -> RenderResult<FrameBufferHandle> {
        let queue = self.registry.borrow().queues().resolve(self.graphics_queue).queue;
        let synchronizer = FrameSynchronizer::new(
            &mut self.backend,
            &FrameSynchronizerDesc {
                platform_handle: desc.platform_handle,
                width: desc.width,
                height: desc.height,
                frame_buffer_count: self.frames_in_flight,
                color_format: desc.color_format,
                depth_format: desc.depth_format,
                vsync: desc.vsync,
                queue,
            },
        )?;
        match self.registry.borrow_mut().frame_buffers_mut().try_alloc(synchronizer) {
            Ok(handle) => Ok(handle),
            Err(synchronizer) => {
                synchronizer.destroy(&mut self.backend)?;
                Err(RenderError::PoolExhausted { kind: "frame-buffers" })
            }
        }
    }

    pub fn destroy_frame_buffer(&mut self, handle: FrameBufferHandle) -> RenderResult<()> {
        let synchronizer = self
            .registry
            .borrow_mut()
            .frame_buffers_mut()
            .release(handle)
            .ok_or(RenderError::InvalidHandle { op: "destroy_frame_buffer" })?;
        synchronizer.destroy(&mut self.backend)
    }

    /// 开始新的一帧并发布当前帧索引
    pub fn new_frame(&mut self, handle: FrameBufferHandle) -> RenderResult<FrameContext> {
        let mut registry = self.registry.borrow_mut();
        let synchronizer = registry
            .frame_buffers_mut()
            .get_mut(handle)
            .ok_or(RenderError::InvalidHandle { op: "new_frame" })?;
        let ctx = synchronizer.new_frame(&mut self.backend)?;
        self.frame_index = ctx.frame_index;
        Ok(ctx)
    }

    pub fn present(&mut self, handle: FrameBufferHandle) -> RenderResult<()> {
        let mut registry = self.registry.borrow_mut();
        let synchronizer =
            registry.frame_buffers_mut().get_mut(handle).ok_or(RenderError::InvalidHandle { op: "present" })?;
        synchronizer.present(&mut self.backend)
    }

    pub fn resize_frame_buffer(&mut self, handle: FrameBufferHandle, width: u32, height: u32) -> RenderResult<()> {
        let mut registry = self.registry.borrow_mut();
        let synchronizer =
            registry.frame_buffers_mut().get_mut(handle).ok_or(RenderError::InvalidHandle { op: "resize" })?;
        synchronizer.resize(&mut self.backend, width, height)
    }
}
