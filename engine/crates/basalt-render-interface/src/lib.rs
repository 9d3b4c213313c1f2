//! 资源生命周期与帧同步核心
//!
//! 两个耦合的子系统：
//!
//! - 代际 handle 管理：[`handle_pool::HandlePool`] 为每类 GPU 对象发放
//!   带校验的 32-bit handle，[`handle_registry::HandleRegistry`] 按资源
//!   种类持有各个 pool；
//! - 帧流水线：[`frame_synchronizer::FrameSynchronizer`] 驱动
//!   acquire → wait → record → submit → present 循环并发布当前帧索引，
//!   [`fif_buffer::FifBuffer`] / [`fif_buffer::FifDescriptorSet`] 按该索引
//!   把物理存储切片，使 CPU 写入永远不会触碰 GPU 仍在读取的那一份。

pub mod error;
pub mod fif_buffer;
pub mod frame_counter;
pub mod frame_synchronizer;
pub mod handle_pool;
pub mod handle_registry;
pub mod handles;
