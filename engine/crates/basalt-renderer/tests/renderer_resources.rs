//! 通过 renderer 创建的多缓冲资源

mod common;

use basalt_gfx::descs::{GfxDescriptorWrite, GfxFormat};
use basalt_render_interface::error::RenderError;
use basalt_render_interface::fif_buffer::UpdateFrequency;
use basalt_renderer::renderer::{DescriptorBinding, FrameBufferDesc, Renderer, RendererDesc};
use basalt_renderer::visual_debug::{DebugVertex, VisualDebug, visible_color};
use common::FakeBackend;

fn make_renderer() -> Renderer<FakeBackend> {
    common::init_test_log();
    Renderer::new(FakeBackend::new(), &RendererDesc::default()).unwrap()
}

fn frame_buffer_desc() -> FrameBufferDesc {
    FrameBufferDesc {
        platform_handle: 0xABCD,
        width: 640,
        height: 480,
        color_format: GfxFormat::Bgra8Unorm,
        depth_format: None,
        vsync: true,
    }
}

#[test]
fn test_frequently_updated_buffer_writes_rotate_slices() {
    let mut renderer = make_renderer();
    let fb = renderer.create_frame_buffer(&frame_buffer_desc()).unwrap();
    let ubo = renderer.create_uniform_buffer(256, true, "per-frame-ubo").unwrap();

    let data = [0u8; 64];
    for _ in 0..3 {
        renderer.new_frame(fb).unwrap();
        renderer.update_buffer(ubo, 16, &data).unwrap();
        renderer.present(fb).unwrap();
    }

    let offsets: Vec<u64> = renderer.backend().buffer_updates().iter().map(|(_, offset, _)| *offset).collect();
    // 帧 0/1/2 各写自己的切片，区间互不相交
    assert_eq!(offsets, vec![16, 256 + 16, 512 + 16]);

    renderer.destroy_buffer(ubo).unwrap();
    renderer.destroy_frame_buffer(fb).unwrap();
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_static_buffer_ignores_frame_rotation() {
    let mut renderer = make_renderer();
    let fb = renderer.create_frame_buffer(&frame_buffer_desc()).unwrap();
    let vbo = renderer.create_vertex_buffer(100, 32, false, "static-vbo").unwrap();

    let data = [0u8; 32];
    for _ in 0..2 {
        renderer.new_frame(fb).unwrap();
        renderer.update_buffer(vbo, 0, &data).unwrap();
        renderer.present(fb).unwrap();
    }

    let offsets: Vec<u64> = renderer.backend().buffer_updates().iter().map(|(_, offset, _)| *offset).collect();
    assert_eq!(offsets, vec![0, 0]);
    assert_eq!(renderer.buffer_bind_offset(vbo, 0).unwrap(), 0);

    renderer.destroy_buffer(vbo).unwrap();
    renderer.destroy_frame_buffer(fb).unwrap();
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_bind_offset_agrees_with_write_offset() {
    let mut renderer = make_renderer();
    let fb = renderer.create_frame_buffer(&frame_buffer_desc()).unwrap();
    let ubo = renderer.create_uniform_buffer(128, true, "ubo").unwrap();

    // 推进到帧索引 1
    renderer.new_frame(fb).unwrap();
    renderer.present(fb).unwrap();
    renderer.new_frame(fb).unwrap();
    assert_eq!(renderer.current_frame_index(), 1);

    renderer.update_buffer(ubo, 8, &[0u8; 16]).unwrap();
    let (_, written_offset, _) = *renderer.backend().buffer_updates().last().unwrap();
    assert_eq!(renderer.buffer_bind_offset(ubo, 8).unwrap(), written_offset);

    renderer.present(fb).unwrap();
    renderer.destroy_buffer(ubo).unwrap();
    renderer.destroy_frame_buffer(fb).unwrap();
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_descriptor_set_updates_select_frame_range() {
    let mut renderer = make_renderer();
    let fb = renderer.create_frame_buffer(&frame_buffer_desc()).unwrap();
    let ubo = renderer.create_uniform_buffer(128, true, "ubo").unwrap();
    let set = renderer.create_descriptor_set(4, UpdateFrequency::PerFrame, "per-frame-set").unwrap();

    // 推进到帧索引 1
    renderer.new_frame(fb).unwrap();
    renderer.present(fb).unwrap();
    renderer.new_frame(fb).unwrap();

    renderer
        .update_descriptor_set(
            set,
            2,
            &[DescriptorBinding::Buffer {
                binding: 0,
                buffer: ubo,
                offset: 0,
                size: 128,
            }],
        )
        .unwrap();

    let (set_index, writes) = renderer.backend().descriptor_updates().pop().unwrap();
    // 帧 1 的区间从 4 开始，帧内下标 2 -> 后端下标 6
    assert_eq!(set_index, 6);
    match &writes[0] {
        GfxDescriptorWrite::Buffer { offset, size, .. } => {
            // buffer 绑定的物理 offset 也切到帧 1
            assert_eq!(*offset, 128);
            assert_eq!(*size, 128);
        }
        other => panic!("expected buffer write, got {other:?}"),
    }

    renderer.present(fb).unwrap();
    renderer.destroy_descriptor_set(set).unwrap();
    renderer.destroy_buffer(ubo).unwrap();
    renderer.destroy_frame_buffer(fb).unwrap();
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_preset_descriptor_set_fills_every_frame_range() {
    let mut renderer = make_renderer();
    let ubo = renderer.create_uniform_buffer(128, true, "ubo").unwrap();
    let set = renderer.create_descriptor_set(4, UpdateFrequency::PerFrame, "per-frame-set").unwrap();

    renderer
        .preset_descriptor_set(
            set,
            1,
            &[DescriptorBinding::Buffer {
                binding: 0,
                buffer: ubo,
                offset: 0,
                size: 128,
            }],
        )
        .unwrap();

    let updates = renderer.backend().descriptor_updates();
    let set_indices: Vec<u32> = updates.iter().map(|(set_index, _)| *set_index).collect();
    assert_eq!(set_indices, vec![1, 5, 9]);

    let offsets: Vec<u64> = updates
        .iter()
        .map(|(_, writes)| match writes[0] {
            GfxDescriptorWrite::Buffer { offset, .. } => offset,
            _ => panic!("expected buffer write"),
        })
        .collect();
    assert_eq!(offsets, vec![0, 128, 256]);

    renderer.destroy_descriptor_set(set).unwrap();
    renderer.destroy_buffer(ubo).unwrap();
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_never_frequency_descriptor_set_has_single_range() {
    let mut renderer = make_renderer();
    let fb = renderer.create_frame_buffer(&frame_buffer_desc()).unwrap();
    let set = renderer.create_descriptor_set(4, UpdateFrequency::Never, "static-set").unwrap();

    // 推进到帧索引 1，静态 set 不随帧移动
    renderer.new_frame(fb).unwrap();
    renderer.present(fb).unwrap();
    renderer.new_frame(fb).unwrap();
    renderer.update_descriptor_set(set, 2, &[]).unwrap();

    let (set_index, _) = renderer.backend().descriptor_updates().pop().unwrap();
    assert_eq!(set_index, 2);

    renderer.present(fb).unwrap();
    renderer.destroy_descriptor_set(set).unwrap();
    renderer.destroy_frame_buffer(fb).unwrap();
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_fixed_sampler_pool_exhaustion_is_recoverable() {
    let mut renderer = make_renderer();

    let mut handles = Vec::new();
    for i in 0..64 {
        handles.push(renderer.register_sampler(basalt_gfx::ids::GfxSamplerId::from_raw(i)).unwrap());
    }
    let overflow = renderer.register_sampler(basalt_gfx::ids::GfxSamplerId::from_raw(64));
    assert!(matches!(overflow, Err(RenderError::PoolExhausted { kind: "samplers" })));

    // 释放一个之后又能注册
    renderer.release_sampler(handles.pop().unwrap()).unwrap();
    let replacement = renderer.register_sampler(basalt_gfx::ids::GfxSamplerId::from_raw(64)).unwrap();
    handles.push(replacement);

    for handle in handles {
        renderer.release_sampler(handle).unwrap();
    }
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_visual_debug_drains_into_frame_slice() {
    let mut renderer = make_renderer();
    let fb = renderer.create_frame_buffer(&frame_buffer_desc()).unwrap();

    let max_vertices = 1024u64;
    let vertex_size = std::mem::size_of::<DebugVertex>() as u64;
    let vbo = renderer.create_vertex_buffer(max_vertices, vertex_size, true, "visdebug-vertices").unwrap();

    let debug = VisualDebug::new();
    // 任意线程都可以往里推
    std::thread::scope(|scope| {
        for t in 0..2 {
            let debug = &debug;
            scope.spawn(move || {
                for i in 0..10 {
                    debug.line(
                        glam::Vec3::splat(t as f32),
                        glam::Vec3::splat(i as f32),
                        visible_color(i),
                    );
                }
            });
        }
    });

    // 推进到帧索引 1，排空本帧的图元并上传
    renderer.new_frame(fb).unwrap();
    renderer.present(fb).unwrap();
    renderer.new_frame(fb).unwrap();

    let mut uploaded = 0u64;
    debug.drain_frame(|prims| {
        assert_eq!(prims.vertices.len(), 2 * 10 * 2);
        renderer.update_buffer(vbo, 0, prims.vertex_bytes()).unwrap();
        uploaded = prims.vertex_bytes().len() as u64;
    });

    let (_, offset, len) = *renderer.backend().buffer_updates().last().unwrap();
    // 写进帧 1 的切片
    assert_eq!(offset, max_vertices * vertex_size);
    assert_eq!(len, uploaded);

    // 排空之后本帧没有剩余图元
    let mut drained_again = false;
    debug.drain_frame(|_| drained_again = true);
    assert!(!drained_again);

    renderer.present(fb).unwrap();
    renderer.destroy_buffer(vbo).unwrap();
    renderer.destroy_frame_buffer(fb).unwrap();
    renderer.destroy().assert_no_live_objects();
}

#[test]
fn test_stale_buffer_handle_is_rejected() {
    let mut renderer = make_renderer();
    let first = renderer.create_uniform_buffer(64, false, "a").unwrap();
    renderer.destroy_buffer(first).unwrap();

    // 第二次销毁和后续访问都报 InvalidHandle
    assert!(matches!(renderer.destroy_buffer(first), Err(RenderError::InvalidHandle { .. })));
    assert!(matches!(renderer.update_buffer(first, 0, &[0u8; 4]), Err(RenderError::InvalidHandle { .. })));

    // slot 复用之后，旧 handle 仍然无效，新旧 handle 不相等
    let second = renderer.create_uniform_buffer(64, false, "b").unwrap();
    assert_ne!(first, second);
    assert!(!renderer.is_buffer_valid(first));
    assert!(renderer.is_buffer_valid(second));

    renderer.destroy_buffer(second).unwrap();
    renderer.destroy().assert_no_live_objects();
}
