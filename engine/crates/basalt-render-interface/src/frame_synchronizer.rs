//! 帧同步
//!
//! 驱动 acquire → wait → record → submit → present 循环。每个 swapchain
//! image 配一对 fence/semaphore；CPU 想复用某个 image 的资源时必须先等它
//! 上一次提交的 fence，这就是限制 CPU 领先 GPU 帧数的背压机制。

use basalt_gfx::backend::{GfxBackend, GfxError, GfxFenceStatus};
use basalt_gfx::descs::{GfxFormat, GfxRenderTargetDesc, GfxSwapchainDesc};
use basalt_gfx::ids::{GfxCommandListId, GfxFenceId, GfxQueueId, GfxSemaphoreId, GfxSwapchainId, GfxTextureId};
use basalt_gfx::transition::GfxTransition;
use itertools::Itertools;

use crate::error::{RenderError, RenderResult};
use crate::frame_counter::FrameCounter;

#[derive(Clone, Debug)]
pub struct FrameSynchronizerDesc {
    /// 平台相关的 window handle，原样传给后端
    pub platform_handle: u64,
    pub width: u32,
    pub height: u32,
    /// swapchain image 数量，同时也是 frames-in-flight 的上限
    pub frame_buffer_count: u32,
    pub color_format: GfxFormat,
    /// None 表示不要深度缓冲
    pub depth_format: Option<GfxFormat>,
    pub vsync: bool,
    /// 提交与 present 共用的队列
    pub queue: GfxQueueId,
}

/// `new_frame` 返回的当前帧上下文
#[derive(Copy, Clone, Debug)]
pub struct FrameContext {
    pub cmd: GfxCommandListId,
    pub render_target: GfxTextureId,
    pub depth_target: Option<GfxTextureId>,
    pub frame_index: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Recording,
}

/// swapchain 与它的同步对象，resize 时整体重建
struct PresentObjects {
    swapchain: GfxSwapchainId,
    depth_target: Option<GfxTextureId>,
    render_complete_fences: Vec<GfxFenceId>,
    render_complete_semaphores: Vec<GfxSemaphoreId>,
    image_acquired_semaphore: GfxSemaphoreId,
    frame_cmds: Vec<GfxCommandListId>,
}

impl PresentObjects {
    fn create(backend: &mut impl GfxBackend, desc: &FrameSynchronizerDesc) -> RenderResult<Self> {
        let count = desc.frame_buffer_count;
        // fence 初始 signaled：每个 image 第一次使用时没有历史提交要等
        let render_complete_fences = (0..count).map(|_| backend.create_fence(true)).collect_vec();
        let render_complete_semaphores = (0..count).map(|_| backend.create_semaphore()).collect_vec();
        let image_acquired_semaphore = backend.create_semaphore();

        let swapchain = backend.create_swapchain(&GfxSwapchainDesc {
            platform_handle: desc.platform_handle,
            width: desc.width,
            height: desc.height,
            image_count: count,
            color_format: desc.color_format,
            vsync: desc.vsync,
        })?;

        let depth_target = match desc.depth_format {
            Some(format) => Some(backend.create_render_target(&GfxRenderTargetDesc {
                width: desc.width,
                height: desc.height,
                format,
                debug_name: "backing-depth-buffer".to_string(),
            })?),
            None => None,
        };

        let frame_cmds =
            (0..count).map(|_| backend.create_command_list(desc.queue)).collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            swapchain,
            depth_target,
            render_complete_fences,
            render_complete_semaphores,
            image_acquired_semaphore,
            frame_cmds,
        })
    }

    fn destroy(&mut self, backend: &mut impl GfxBackend) {
        for cmd in self.frame_cmds.drain(..) {
            backend.destroy_command_list(cmd);
        }
        if let Some(depth) = self.depth_target.take() {
            backend.destroy_render_target(depth);
        }
        backend.destroy_swapchain(self.swapchain);
        backend.destroy_semaphore(self.image_acquired_semaphore);
        for semaphore in self.render_complete_semaphores.drain(..) {
            backend.destroy_semaphore(semaphore);
        }
        for fence in self.render_complete_fences.drain(..) {
            backend.destroy_fence(fence);
        }
    }
}

/// 帧同步器
///
/// 对某个 image index 的保证：第 N+1 次使用该 image 的提交，一定在第 N 次
/// 提交的 fence signaled 之后才开始录制。多缓冲资源依赖这一点安全复用
/// 按帧切片的物理区间。
///
/// # Destroy
/// drop 前必须调用 [`FrameSynchronizer::destroy`]，它会先排空 in-flight
/// 的工作再销毁同步对象。
pub struct FrameSynchronizer {
    desc: FrameSynchronizerDesc,
    objects: PresentObjects,

    /// 每次 new_frame 恰好改写一次，总在 [0, frame_buffer_count) 内
    current_frame_index: u32,
    frame_counter: FrameCounter,
    phase: FramePhase,

    #[cfg(debug_assertions)]
    destroyed: bool,
}

// new & init
impl FrameSynchronizer {
    pub fn new(backend: &mut impl GfxBackend, desc: &FrameSynchronizerDesc) -> RenderResult<Self> {
        assert!(desc.width > 0 && desc.height > 0);
        assert!((1..=FrameCounter::MAX_FIF_COUNT as u32).contains(&desc.frame_buffer_count));

        let objects = PresentObjects::create(backend, desc)?;

        log::info!(
            "create frame synchronizer: {}x{}, {} frame buffers, depth: {}",
            desc.width,
            desc.height,
            desc.frame_buffer_count,
            desc.depth_format.is_some()
        );

        Ok(Self {
            desc: desc.clone(),
            objects,
            current_frame_index: 0,
            frame_counter: FrameCounter::new(desc.frame_buffer_count as usize),
            phase: FramePhase::Idle,

            #[cfg(debug_assertions)]
            destroyed: false,
        })
    }
}

// destroy
impl FrameSynchronizer {
    /// 排空 in-flight 的工作并销毁所有对象
    pub fn destroy(mut self, backend: &mut impl GfxBackend) -> RenderResult<()> {
        self.drain_gpu(backend)?;
        self.objects.destroy(backend);
        #[cfg(debug_assertions)]
        {
            self.destroyed = true;
        }
        Ok(())
    }

    /// 等待每个 image 的 fence，再等队列空闲
    fn drain_gpu(&mut self, backend: &mut impl GfxBackend) -> RenderResult<()> {
        backend.wait_for_fences(&self.objects.render_complete_fences).map_err(Self::map_wait_error)?;
        backend.queue_wait_idle(self.desc.queue).map_err(Self::map_wait_error)?;
        Ok(())
    }

    fn map_wait_error(e: GfxError) -> RenderError {
        match e {
            GfxError::DeviceLost => RenderError::DeviceNotReady,
            other => RenderError::Backend(other),
        }
    }
}
impl Drop for FrameSynchronizer {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed, "FrameSynchronizer dropped without destroy()");
    }
}

// 每帧循环
impl FrameSynchronizer {
    /// 开始新的一帧
    ///
    /// acquire 下一个 image；如果该 image 上一次提交还没执行完就阻塞等它
    /// （CPU 最多领先 GPU frame_buffer_count 帧）；然后开始录制命令并插入
    /// render target / depth 的进入迁移。
    pub fn new_frame(&mut self, backend: &mut impl GfxBackend) -> RenderResult<FrameContext> {
        let _span = tracy_client::span!("FrameSynchronizer::new_frame");
        debug_assert!(self.phase == FramePhase::Idle);

        let acquired = backend.acquire_next_image(self.objects.swapchain, self.objects.image_acquired_semaphore)?;
        if acquired.suboptimal {
            log::warn!("swapchain acquire image index {} is not optimal", acquired.image_index);
        }
        let image_index = acquired.image_index;
        debug_assert!(image_index < self.desc.frame_buffer_count);

        // 背压：这个 image 的上一次提交还没被 GPU 消化完，就停在这里
        let fence = self.objects.render_complete_fences[image_index as usize];
        if backend.fence_status(fence) == GfxFenceStatus::Incomplete {
            backend.wait_for_fences(std::slice::from_ref(&fence)).map_err(Self::map_wait_error)?;
        }

        self.current_frame_index = image_index;
        self.frame_counter.next_frame();

        let render_target = backend.swapchain_target(self.objects.swapchain, image_index);
        let cmd = self.objects.frame_cmds[image_index as usize];
        backend.begin_command_recording(cmd);

        let mut transitions = vec![GfxTransition::ToRenderTarget(render_target)];
        if let Some(depth) = self.objects.depth_target {
            transitions.push(GfxTransition::ToDepthWrite(depth));
        }
        backend.insert_resource_barrier(cmd, &transitions);

        self.phase = FramePhase::Recording;
        Ok(FrameContext {
            cmd,
            render_target,
            depth_target: self.objects.depth_target,
            frame_index: image_index,
        })
    }

    /// 结束录制、提交并 present 当前帧
    pub fn present(&mut self, backend: &mut impl GfxBackend) -> RenderResult<()> {
        let _span = tracy_client::span!("FrameSynchronizer::present");
        debug_assert!(self.phase == FramePhase::Recording);

        let image_index = self.current_frame_index;
        let cmd = self.objects.frame_cmds[image_index as usize];
        let render_target = backend.swapchain_target(self.objects.swapchain, image_index);
        let render_complete = self.objects.render_complete_semaphores[image_index as usize];

        backend.insert_resource_barrier(cmd, &[GfxTransition::ToPresent(render_target)]);
        backend.end_command_recording(cmd);

        backend.submit_commands(
            self.desc.queue,
            std::slice::from_ref(&cmd),
            std::slice::from_ref(&self.objects.image_acquired_semaphore),
            std::slice::from_ref(&render_complete),
            Some(self.objects.render_complete_fences[image_index as usize]),
        )?;

        let suboptimal = backend.queue_present(
            self.desc.queue,
            self.objects.swapchain,
            image_index,
            std::slice::from_ref(&render_complete),
        )?;
        if suboptimal {
            log::warn!("swapchain present image index {image_index} is not optimal");
        }

        self.phase = FramePhase::Idle;
        Ok(())
    }

    /// surface 尺寸变化：排空 in-flight 的工作后重建 swapchain 和同步对象
    pub fn resize(&mut self, backend: &mut impl GfxBackend, width: u32, height: u32) -> RenderResult<()> {
        debug_assert!(self.phase == FramePhase::Idle);
        assert!(width > 0 && height > 0);

        // 不能销毁 GPU 还引用着的资源
        self.drain_gpu(backend)?;
        self.objects.destroy(backend);

        log::info!("resize frame synchronizer: {}x{} -> {}x{}", self.desc.width, self.desc.height, width, height);
        self.desc.width = width;
        self.desc.height = height;

        self.objects = PresentObjects::create(backend, &self.desc)?;
        self.current_frame_index = 0;
        Ok(())
    }
}

// getters
impl FrameSynchronizer {
    #[inline]
    pub fn current_frame_index(&self) -> u32 {
        self.current_frame_index
    }

    #[inline]
    pub fn frame_buffer_count(&self) -> u32 {
        self.desc.frame_buffer_count
    }

    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        self.frame_counter.frame_name()
    }
}
