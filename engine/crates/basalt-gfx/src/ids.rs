//! 后端对象的不透明 id
//!
//! 这些 id 由后端签发，核心层只负责保存和回传，不解释其内容。

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

backend_id!(GfxBufferId);
backend_id!(GfxTextureId);
backend_id!(GfxSamplerId);
backend_id!(GfxPipelineId);
backend_id!(GfxShaderId);
backend_id!(GfxDescriptorSetId);
backend_id!(GfxFenceId);
backend_id!(GfxSemaphoreId);
backend_id!(GfxSwapchainId);
backend_id!(GfxCommandListId);
backend_id!(GfxQueueId);
