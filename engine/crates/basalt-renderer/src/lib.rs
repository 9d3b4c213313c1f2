//! 面向客户端的 renderer 层
//!
//! [`renderer::Renderer`] 把 handle 注册表、多缓冲资源和帧同步器组合成
//! 一套按资源种类划分的 create/destroy/update 操作；
//! [`visual_debug::VisualDebug`] 是唯一允许跨线程写入的调试标注生产者。

pub mod renderer;
pub mod visual_debug;
