//! 测试用的假后端
//!
//! 记录每一次调用的顺序，按轮转发放 acquire 的 image index，
//! fence/对象的存活状态都可查询，用来验证帧同步协议的调用次序和
//! 资源不泄漏。

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Once;

use basalt_gfx::backend::{GfxAcquiredImage, GfxBackend, GfxError, GfxFenceStatus};
use basalt_gfx::descs::{
    GfxBufferDesc, GfxDescriptorSetDesc, GfxDescriptorWrite, GfxQueueKind, GfxRenderTargetDesc, GfxSwapchainDesc,
};
use basalt_gfx::ids::{
    GfxBufferId, GfxCommandListId, GfxDescriptorSetId, GfxFenceId, GfxQueueId, GfxSemaphoreId, GfxSwapchainId,
    GfxTextureId,
};
use basalt_gfx::transition::GfxTransition;

/// 整个测试进程只初始化一次 logger 和 tracy client
pub fn init_test_log() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // span! 要求 client 在跑；挂着不放直到进程退出
        std::mem::forget(tracy_client::Client::start());
        basalt_crate_tools::init_log::init_log();
    });
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FenceStatus(GfxFenceId),
    WaitForFences(Vec<GfxFenceId>),
    QueueWaitIdle,
    AcquireImage { swapchain: GfxSwapchainId, image_index: u32 },
    BeginRecording(GfxCommandListId),
    EndRecording(GfxCommandListId),
    Barrier(GfxCommandListId, Vec<GfxTransition>),
    Submit { cmds: Vec<GfxCommandListId>, fence: Option<GfxFenceId> },
    Present { image_index: u32 },
    UpdateBuffer { buffer: GfxBufferId, offset: u64, len: u64 },
    UpdateDescriptorSet { set: GfxDescriptorSetId, set_index: u32, writes: Vec<GfxDescriptorWrite> },
    DestroySwapchain(GfxSwapchainId),
}

#[derive(Default)]
pub struct FakeBackend {
    next_id: u64,
    pub calls: Vec<Call>,

    /// fence id -> signaled
    fences: HashMap<u64, bool>,
    live_buffers: HashSet<u64>,
    live_semaphores: HashSet<u64>,
    live_swapchains: HashMap<u64, u32>,
    live_render_targets: HashSet<u64>,
    live_descriptor_sets: HashSet<u64>,
    live_command_lists: HashSet<u64>,
    acquire_counters: HashMap<u64, u32>,

    /// 下一次 fence_status 强制报告一次 Incomplete
    pub force_incomplete_once: bool,
    /// 提交后 fence 保持未 signaled，模拟 GPU 落在后面
    pub gpu_stalled: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// 所有后端对象都已归还
    pub fn assert_no_live_objects(&self) {
        assert!(self.live_buffers.is_empty(), "leaked buffers: {:?}", self.live_buffers);
        assert!(self.fences.is_empty(), "leaked fences: {:?}", self.fences);
        assert!(self.live_semaphores.is_empty(), "leaked semaphores: {:?}", self.live_semaphores);
        assert!(self.live_swapchains.is_empty(), "leaked swapchains: {:?}", self.live_swapchains);
        assert!(self.live_render_targets.is_empty(), "leaked render targets: {:?}", self.live_render_targets);
        assert!(self.live_descriptor_sets.is_empty(), "leaked descriptor sets: {:?}", self.live_descriptor_sets);
        assert!(self.live_command_lists.is_empty(), "leaked command lists: {:?}", self.live_command_lists);
    }

    /// 第一个满足条件的调用在 calls 里的位置
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(predicate)
    }

    pub fn buffer_updates(&self) -> Vec<(GfxBufferId, u64, u64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::UpdateBuffer { buffer, offset, len } => Some((*buffer, *offset, *len)),
                _ => None,
            })
            .collect()
    }

    pub fn descriptor_updates(&self) -> Vec<(u32, Vec<GfxDescriptorWrite>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::UpdateDescriptorSet { set_index, writes, .. } => Some((*set_index, writes.clone())),
                _ => None,
            })
            .collect()
    }
}

impl GfxBackend for FakeBackend {
    fn create_buffer(&mut self, _desc: &GfxBufferDesc) -> Result<GfxBufferId, GfxError> {
        let id = self.next_id();
        self.live_buffers.insert(id);
        Ok(GfxBufferId::from_raw(id))
    }

    fn destroy_buffer(&mut self, buffer: GfxBufferId) {
        assert!(self.live_buffers.remove(&buffer.raw()), "destroying unknown buffer");
    }

    fn update_buffer(&mut self, buffer: GfxBufferId, offset: u64, data: &[u8]) {
        assert!(self.live_buffers.contains(&buffer.raw()));
        self.calls.push(Call::UpdateBuffer {
            buffer,
            offset,
            len: data.len() as u64,
        });
    }

    fn create_fence(&mut self, signaled: bool) -> GfxFenceId {
        let id = self.next_id();
        self.fences.insert(id, signaled);
        GfxFenceId::from_raw(id)
    }

    fn destroy_fence(&mut self, fence: GfxFenceId) {
        assert!(self.fences.remove(&fence.raw()).is_some(), "destroying unknown fence");
    }

    fn fence_status(&mut self, fence: GfxFenceId) -> GfxFenceStatus {
        self.calls.push(Call::FenceStatus(fence));
        if self.force_incomplete_once {
            self.force_incomplete_once = false;
            return GfxFenceStatus::Incomplete;
        }
        if self.fences[&fence.raw()] { GfxFenceStatus::Complete } else { GfxFenceStatus::Incomplete }
    }

    fn wait_for_fences(&mut self, fences: &[GfxFenceId]) -> Result<(), GfxError> {
        self.calls.push(Call::WaitForFences(fences.to_vec()));
        for fence in fences {
            // 等待即视为 GPU 赶上来了
            *self.fences.get_mut(&fence.raw()).unwrap() = true;
        }
        Ok(())
    }

    fn create_semaphore(&mut self) -> GfxSemaphoreId {
        let id = self.next_id();
        self.live_semaphores.insert(id);
        GfxSemaphoreId::from_raw(id)
    }

    fn destroy_semaphore(&mut self, semaphore: GfxSemaphoreId) {
        assert!(self.live_semaphores.remove(&semaphore.raw()), "destroying unknown semaphore");
    }

    fn create_swapchain(&mut self, desc: &GfxSwapchainDesc) -> Result<GfxSwapchainId, GfxError> {
        let id = self.next_id();
        self.live_swapchains.insert(id, desc.image_count);
        self.acquire_counters.insert(id, 0);
        Ok(GfxSwapchainId::from_raw(id))
    }

    fn destroy_swapchain(&mut self, swapchain: GfxSwapchainId) {
        assert!(self.live_swapchains.remove(&swapchain.raw()).is_some(), "destroying unknown swapchain");
        self.acquire_counters.remove(&swapchain.raw());
        self.calls.push(Call::DestroySwapchain(swapchain));
    }

    fn acquire_next_image(
        &mut self,
        swapchain: GfxSwapchainId,
        _signal_semaphore: GfxSemaphoreId,
    ) -> Result<GfxAcquiredImage, GfxError> {
        let image_count = self.live_swapchains[&swapchain.raw()];
        let counter = self.acquire_counters.get_mut(&swapchain.raw()).unwrap();
        let image_index = *counter % image_count;
        *counter += 1;
        self.calls.push(Call::AcquireImage { swapchain, image_index });
        Ok(GfxAcquiredImage {
            image_index,
            suboptimal: false,
        })
    }

    fn swapchain_target(&mut self, swapchain: GfxSwapchainId, image_index: u32) -> GfxTextureId {
        GfxTextureId::from_raw(swapchain.raw() * 1000 + image_index as u64)
    }

    fn queue_present(
        &mut self,
        _queue: GfxQueueId,
        _swapchain: GfxSwapchainId,
        image_index: u32,
        _wait_semaphores: &[GfxSemaphoreId],
    ) -> Result<bool, GfxError> {
        self.calls.push(Call::Present { image_index });
        Ok(false)
    }

    fn create_render_target(&mut self, _desc: &GfxRenderTargetDesc) -> Result<GfxTextureId, GfxError> {
        let id = self.next_id();
        self.live_render_targets.insert(id);
        Ok(GfxTextureId::from_raw(id))
    }

    fn destroy_render_target(&mut self, target: GfxTextureId) {
        assert!(self.live_render_targets.remove(&target.raw()), "destroying unknown render target");
    }

    fn create_descriptor_set(&mut self, _desc: &GfxDescriptorSetDesc) -> Result<GfxDescriptorSetId, GfxError> {
        let id = self.next_id();
        self.live_descriptor_sets.insert(id);
        Ok(GfxDescriptorSetId::from_raw(id))
    }

    fn destroy_descriptor_set(&mut self, set: GfxDescriptorSetId) {
        assert!(self.live_descriptor_sets.remove(&set.raw()), "destroying unknown descriptor set");
    }

    fn update_descriptor_set(&mut self, set: GfxDescriptorSetId, set_index: u32, writes: &[GfxDescriptorWrite]) {
        assert!(self.live_descriptor_sets.contains(&set.raw()));
        self.calls.push(Call::UpdateDescriptorSet {
            set,
            set_index,
            writes: writes.to_vec(),
        });
    }

    fn acquire_queue(&mut self, kind: GfxQueueKind) -> GfxQueueId {
        // 每种队列是后端自己的单例
        GfxQueueId::from_raw(match kind {
            GfxQueueKind::Graphics => 1,
            GfxQueueKind::Compute => 2,
            GfxQueueKind::Blit => 3,
        })
    }

    fn queue_wait_idle(&mut self, _queue: GfxQueueId) -> Result<(), GfxError> {
        self.calls.push(Call::QueueWaitIdle);
        for signaled in self.fences.values_mut() {
            *signaled = true;
        }
        Ok(())
    }

    fn create_command_list(&mut self, _queue: GfxQueueId) -> Result<GfxCommandListId, GfxError> {
        let id = self.next_id();
        self.live_command_lists.insert(id);
        Ok(GfxCommandListId::from_raw(id))
    }

    fn destroy_command_list(&mut self, cmd: GfxCommandListId) {
        assert!(self.live_command_lists.remove(&cmd.raw()), "destroying unknown command list");
    }

    fn begin_command_recording(&mut self, cmd: GfxCommandListId) {
        self.calls.push(Call::BeginRecording(cmd));
    }

    fn end_command_recording(&mut self, cmd: GfxCommandListId) {
        self.calls.push(Call::EndRecording(cmd));
    }

    fn insert_resource_barrier(&mut self, cmd: GfxCommandListId, transitions: &[GfxTransition]) {
        self.calls.push(Call::Barrier(cmd, transitions.to_vec()));
    }

    fn submit_commands(
        &mut self,
        _queue: GfxQueueId,
        cmds: &[GfxCommandListId],
        _wait_semaphores: &[GfxSemaphoreId],
        _signal_semaphores: &[GfxSemaphoreId],
        signal_fence: Option<GfxFenceId>,
    ) -> Result<(), GfxError> {
        self.calls.push(Call::Submit {
            cmds: cmds.to_vec(),
            fence: signal_fence,
        });
        if let Some(fence) = signal_fence {
            // gpu_stalled 时命令留在队列里没执行完
            *self.fences.get_mut(&fence.raw()).unwrap() = !self.gpu_stalled;
        }
        Ok(())
    }
}
