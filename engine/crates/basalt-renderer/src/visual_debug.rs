//! 调试标注的生产者路径
//!
//! 本核心里唯一允许多线程写入的组件：任意调用点把调试线段/三角形推进
//! 共享的可增长 buffer，渲染线程每帧在同一把锁下取走并清空。除此之外
//! 没有任何组件是多写者安全的。

use std::sync::Mutex;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// 打包 RGBA 到 u32
#[inline]
pub const fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

/// 按 primitive id 从固定表里挑一个可辨识的颜色
pub fn visible_color(primitive_id: u32) -> u32 {
    const COLOR_TABLE: [u32; 8] = [
        pack_color(0xe6, 0x26, 0x1f, 0xFF),
        pack_color(0xeb, 0x75, 0x32, 0xFF),
        pack_color(0xf7, 0xd0, 0x38, 0xFF),
        pack_color(0xa2, 0xe0, 0x48, 0xFF),
        pack_color(0x49, 0xda, 0x9a, 0xFF),
        pack_color(0x34, 0xbb, 0xe6, 0xFF),
        pack_color(0x43, 0x55, 0xdb, 0xFF),
        pack_color(0xd2, 0x3b, 0xe7, 0xFF),
    ];
    COLOR_TABLE[primitive_id as usize % COLOR_TABLE.len()]
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DebugVertex {
    pub pos: Vec3,
    pub color: u32,
}

/// 一帧攒下来的调试图元
#[derive(Default)]
pub struct DebugPrims {
    pub vertices: Vec<DebugVertex>,
    pub line_indices: Vec<u32>,
    pub tri_indices: Vec<u32>,
}

impl DebugPrims {
    #[inline]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.line_indices.clear();
        self.tri_indices.clear();
    }
}

/// 调试标注收集器
///
/// push 和每帧一次的 drain 都在同一把锁下进行。
#[derive(Default)]
pub struct VisualDebug {
    prims: Mutex<DebugPrims>,
}

// 生产者，任意线程
impl VisualDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self, p0: Vec3, p1: Vec3, color: u32) {
        let mut prims = self.prims.lock().unwrap();
        let i0 = Self::push_vertex(&mut prims, p0, color);
        let i1 = Self::push_vertex(&mut prims, p1, color);
        prims.line_indices.push(i0);
        prims.line_indices.push(i1);
    }

    /// 首尾相连的折线
    pub fn line_strip(&self, points: &[Vec3], color: u32) {
        if points.len() < 2 {
            return;
        }
        let mut prims = self.prims.lock().unwrap();
        let base = Self::push_vertices(&mut prims, points, color);
        for i in 0..points.len() as u32 - 1 {
            prims.line_indices.push(base + i);
            prims.line_indices.push(base + i + 1);
        }
    }

    pub fn solid_triangle(&self, a: Vec3, b: Vec3, c: Vec3, color: u32) {
        let mut prims = self.prims.lock().unwrap();
        let base = Self::push_vertices(&mut prims, &[a, b, c], color);
        prims.tri_indices.extend([base, base + 1, base + 2]);
    }

    fn push_vertex(prims: &mut DebugPrims, pos: Vec3, color: u32) -> u32 {
        let index = prims.vertices.len() as u32;
        prims.vertices.push(DebugVertex { pos, color });
        index
    }

    fn push_vertices(prims: &mut DebugPrims, points: &[Vec3], color: u32) -> u32 {
        let base = prims.vertices.len() as u32;
        prims.vertices.extend(points.iter().map(|pos| DebugVertex { pos: *pos, color }));
        base
    }
}

// 消费者，渲染线程，每帧一次
impl VisualDebug {
    /// 取走本帧攒下的图元并清空
    ///
    /// 回调在锁内执行，应当只做一次 buffer 上传，别在里面干别的。
    pub fn drain_frame(&self, consume: impl FnOnce(&DebugPrims)) {
        let mut prims = self.prims.lock().unwrap();
        if !prims.is_empty() {
            consume(&prims);
        }
        prims.clear();
    }
}
