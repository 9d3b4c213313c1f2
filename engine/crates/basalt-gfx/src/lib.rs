//! 图形后端的抽象边界
//!
//! 渲染核心只通过 [`backend::GfxBackend`] 这一个 capability 与真正的
//! 图形 API（Vulkan/D3D/Metal...）交互。后端对象以不透明 id 的形式暴露，
//! 资源状态迁移通过封闭的 [`transition::GfxTransition`] 表达，
//! 由后端在边界处做一次翻译。

pub mod backend;
pub mod descs;
pub mod ids;
pub mod transition;
