//! 渲染核心消费的后端 capability

use thiserror::Error;

use crate::descs::{
    GfxBufferDesc, GfxDescriptorSetDesc, GfxDescriptorWrite, GfxQueueKind, GfxRenderTargetDesc, GfxSwapchainDesc,
};
use crate::ids::{
    GfxBufferId, GfxCommandListId, GfxDescriptorSetId, GfxFenceId, GfxQueueId, GfxSemaphoreId, GfxSwapchainId,
    GfxTextureId,
};
use crate::transition::GfxTransition;

/// 后端调用失败的原因
///
/// 核心层不重试这些错误，一律向创建/调用点传播。
#[derive(Debug, Error)]
pub enum GfxError {
    #[error("backend allocation failed: {what}")]
    AllocationFailed { what: String },
    /// swapchain 与 surface 尺寸不再匹配，需要重建
    #[error("swapchain is out of date")]
    OutOfDate,
    #[error("device lost")]
    DeviceLost,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxFenceStatus {
    /// fence 对应的提交已经在 GPU 上执行完毕
    Complete,
    /// GPU 还没执行完，等待方需要阻塞
    Incomplete,
}

/// acquire 的结果
#[derive(Copy, Clone, Debug)]
pub struct GfxAcquiredImage {
    pub image_index: u32,
    /// swapchain 仍可用，但与 surface 已经不完全匹配
    pub suboptimal: bool,
}

/// 图形后端 capability
///
/// 渲染核心与真正图形 API 之间的唯一边界。所有方法都运行在单一渲染线程上，
/// 实现无需考虑并发调用。fence 等待是无界阻塞；能够检测 device lost 的
/// 后端应当返回 [`GfxError::DeviceLost`] 而不是永远挂起。
pub trait GfxBackend {
    // ------------------------------ buffer ------------------------------
    fn create_buffer(&mut self, desc: &GfxBufferDesc) -> Result<GfxBufferId, GfxError>;
    fn destroy_buffer(&mut self, buffer: GfxBufferId);
    /// 将 data 写入 buffer 的 [offset, offset + data.len()) 区间
    fn update_buffer(&mut self, buffer: GfxBufferId, offset: u64, data: &[u8]);

    // --------------------------- 同步原语 ---------------------------
    fn create_fence(&mut self, signaled: bool) -> GfxFenceId;
    fn destroy_fence(&mut self, fence: GfxFenceId);
    fn fence_status(&mut self, fence: GfxFenceId) -> GfxFenceStatus;
    /// 阻塞直到所有 fence 都 signaled
    fn wait_for_fences(&mut self, fences: &[GfxFenceId]) -> Result<(), GfxError>;

    fn create_semaphore(&mut self) -> GfxSemaphoreId;
    fn destroy_semaphore(&mut self, semaphore: GfxSemaphoreId);

    // ----------------------------- swapchain -----------------------------
    fn create_swapchain(&mut self, desc: &GfxSwapchainDesc) -> Result<GfxSwapchainId, GfxError>;
    fn destroy_swapchain(&mut self, swapchain: GfxSwapchainId);
    /// 取得 image index，signal_semaphore 在 image 可用时被 signal
    fn acquire_next_image(
        &mut self,
        swapchain: GfxSwapchainId,
        signal_semaphore: GfxSemaphoreId,
    ) -> Result<GfxAcquiredImage, GfxError>;
    fn swapchain_target(&mut self, swapchain: GfxSwapchainId, image_index: u32) -> GfxTextureId;
    /// 返回 true 表示 present 成功但 swapchain 需要重建
    fn queue_present(
        &mut self,
        queue: GfxQueueId,
        swapchain: GfxSwapchainId,
        image_index: u32,
        wait_semaphores: &[GfxSemaphoreId],
    ) -> Result<bool, GfxError>;

    // --------------------------- render target ---------------------------
    fn create_render_target(&mut self, desc: &GfxRenderTargetDesc) -> Result<GfxTextureId, GfxError>;
    fn destroy_render_target(&mut self, target: GfxTextureId);

    // --------------------------- descriptor set ---------------------------
    fn create_descriptor_set(&mut self, desc: &GfxDescriptorSetDesc) -> Result<GfxDescriptorSetId, GfxError>;
    fn destroy_descriptor_set(&mut self, set: GfxDescriptorSetId);
    fn update_descriptor_set(&mut self, set: GfxDescriptorSetId, set_index: u32, writes: &[GfxDescriptorWrite]);

    // ------------------------------ 命令与队列 ------------------------------
    fn acquire_queue(&mut self, kind: GfxQueueKind) -> GfxQueueId;
    fn queue_wait_idle(&mut self, queue: GfxQueueId) -> Result<(), GfxError>;

    fn create_command_list(&mut self, queue: GfxQueueId) -> Result<GfxCommandListId, GfxError>;
    fn destroy_command_list(&mut self, cmd: GfxCommandListId);
    fn begin_command_recording(&mut self, cmd: GfxCommandListId);
    fn end_command_recording(&mut self, cmd: GfxCommandListId);
    fn insert_resource_barrier(&mut self, cmd: GfxCommandListId, transitions: &[GfxTransition]);
    /// 提交命令；fence 在全部命令执行完后 signaled
    fn submit_commands(
        &mut self,
        queue: GfxQueueId,
        cmds: &[GfxCommandListId],
        wait_semaphores: &[GfxSemaphoreId],
        signal_semaphores: &[GfxSemaphoreId],
        signal_fence: Option<GfxFenceId>,
    ) -> Result<(), GfxError>;
}
