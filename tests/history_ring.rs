//! History ring integration tests: rotation, resize handling and the
//! camera-level reset flags built on top of it.

mod common;

use rstest::rstest;

use common::{init_logging, TestContext};
use lilium_postfx::{
    DummyBackend, GraphicsBackend, HistoryBufferDesc, HistoryBufferRing, HistoryId, PostFxError,
    SwapOutcome, TextureFormat,
};

const TAA: HistoryId = HistoryId::FIRST_USER;

fn color_history() -> HistoryBufferDesc {
    HistoryBufferDesc::new("taa", TextureFormat::Rgba16Float)
}

fn ring_at(backend: &mut DummyBackend, width: u32, height: u32) -> HistoryBufferRing {
    let mut ring = HistoryBufferRing::new();
    ring.swap(backend, width, height);
    ring
}

// ============================================================================
// Ring rotation
// ============================================================================

#[test]
fn test_double_buffer_rotation() {
    init_logging();
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 640, 360);
    ring.allocate_buffer(&mut backend, TAA, &color_history(), 2)
        .unwrap();
    let slots = ring.slots(TAA).unwrap().to_vec();

    for k in 0..=10usize {
        assert_eq!(ring.get_slot(TAA, 0).unwrap(), slots[k % 2], "k = {k}");
        assert_eq!(ring.get_slot(TAA, 1).unwrap(), slots[(k + 1) % 2], "k = {k}");
        assert_eq!(ring.swap(&mut backend, 640, 360), SwapOutcome::Advanced);
    }
}

#[rstest]
#[case::triple(3)]
#[case::quad(4)]
#[case::deep(8)]
fn test_n_deep_rotation(#[case] count: usize) {
    init_logging();
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 64, 64);
    ring.allocate_buffer(&mut backend, TAA, &color_history(), count)
        .unwrap();
    let slots = ring.slots(TAA).unwrap().to_vec();

    for k in 0..(3 * count) {
        for frames_ago in 0..count {
            let expected = slots[(k + count - frames_ago) % count];
            assert_eq!(ring.get_slot(TAA, frames_ago).unwrap(), expected);
        }
        ring.swap(&mut backend, 64, 64);
    }
}

#[test]
fn test_ids_share_the_clock() {
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 64, 64);
    ring.allocate_buffer(&mut backend, HistoryId::EXPOSURE, &color_history().with_fixed_size(1, 1), 2)
        .unwrap();
    ring.swap(&mut backend, 64, 64);
    ring.allocate_buffer(&mut backend, TAA, &color_history(), 2)
        .unwrap();

    let exposure_current = ring.current(HistoryId::EXPOSURE).unwrap();
    let taa_current = ring.current(TAA).unwrap();
    ring.swap(&mut backend, 64, 64);
    assert_eq!(ring.previous(HistoryId::EXPOSURE).unwrap(), exposure_current);
    assert_eq!(ring.previous(TAA).unwrap(), taa_current);
}

// ============================================================================
// Shrink triggers reset
// ============================================================================

#[rstest]
#[case::both_dimensions(1280, 720)]
#[case::width_only(1280, 1080)]
#[case::height_only(1920, 720)]
fn test_shrink_resets_ring(#[case] width: u32, #[case] height: u32) {
    init_logging();
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 1920, 1080);
    ring.allocate_buffer(&mut backend, TAA, &color_history(), 2)
        .unwrap();
    ring.allocate_buffer(&mut backend, HistoryId::EXPOSURE, &color_history().with_fixed_size(1, 1), 2)
        .unwrap();
    let old: Vec<_> = ring
        .slots(TAA)
        .unwrap()
        .iter()
        .chain(ring.slots(HistoryId::EXPOSURE).unwrap())
        .copied()
        .collect();

    assert_eq!(ring.swap(&mut backend, width, height), SwapOutcome::Reset);
    assert!(old.iter().all(|handle| !backend.is_live(*handle)));
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(ring.get_slot(TAA, 0), Err(PostFxError::HistoryNotAllocated(TAA)));

    ring.allocate_buffer(&mut backend, TAA, &color_history(), 2)
        .unwrap();
    let fresh = ring.slots(TAA).unwrap().to_vec();
    assert!(fresh.iter().all(|handle| !old.contains(handle) && backend.is_live(*handle)));
    let desc = backend.descriptor(fresh[0]).unwrap();
    assert_eq!((desc.width, desc.height), (width, height));
}

#[test]
fn test_shrink_then_stable_advances() {
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 1920, 1080);
    assert_eq!(ring.swap(&mut backend, 1280, 720), SwapOutcome::Reset);
    assert_eq!(ring.swap(&mut backend, 1280, 720), SwapOutcome::Advanced);
    assert_eq!(ring.max_reference_size(), glam::UVec2::new(1280, 720));
}

// ============================================================================
// Growth and shape changes
// ============================================================================

#[test]
fn test_growth_reallocates_in_place() {
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 1280, 720);
    let half = color_history().with_scale(0.5);
    ring.allocate_buffer(&mut backend, TAA, &half, 2).unwrap();
    let old = ring.slots(TAA).unwrap().to_vec();

    assert_eq!(ring.swap(&mut backend, 1920, 1080), SwapOutcome::Grown);
    let grown = ring.slots(TAA).unwrap().to_vec();
    assert!(old.iter().all(|handle| !backend.is_live(*handle)));
    assert_eq!(backend.descriptor(grown[0]).map(|d| (d.width, d.height)), Some((960, 540)));
    assert_eq!(backend.live_texture_count(), 2);

    // Returning to the new maximum is a normal frame.
    assert_eq!(ring.swap(&mut backend, 1920, 1080), SwapOutcome::Advanced);
}

#[test]
fn test_release_buffer_then_reshape() {
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 64, 64);
    ring.allocate_buffer(&mut backend, TAA, &color_history(), 2)
        .unwrap();
    assert!(ring.release_buffer(&mut backend, TAA));
    ring.allocate_buffer(&mut backend, TAA, &color_history(), 3)
        .unwrap();
    assert_eq!(ring.buffer_count(TAA), Some(3));
    assert_eq!(backend.live_texture_count(), 3);
}

#[test]
fn test_custom_factory_sees_slot_index() {
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 32, 16);
    ring.allocate_buffer_with(&mut backend, TAA, 2, |ctx, slot| {
        let desc = lilium_postfx::TextureDescriptor::color_target(
            ctx.reference_size.x,
            ctx.reference_size.y,
            TextureFormat::R32Float,
        )
        .with_label(format!("{:?}_{slot}", ctx.id));
        Ok(ctx.backend.create_texture(&desc)?)
    })
    .unwrap();

    let labels: Vec<_> = ring
        .slots(TAA)
        .unwrap()
        .iter()
        .map(|handle| backend.descriptor(*handle).and_then(|d| d.label.clone()))
        .collect();
    assert_eq!(
        labels,
        vec![
            Some("HistoryId(64)_0".to_string()),
            Some("HistoryId(64)_1".to_string())
        ]
    );
}

#[test]
fn test_dispose_releases_everything() {
    let mut backend = DummyBackend::new();
    let mut ring = ring_at(&mut backend, 64, 64);
    for id in 0..4 {
        ring.allocate_buffer(&mut backend, HistoryId::new(100 + id), &color_history(), 2)
            .unwrap();
    }
    assert_eq!(backend.live_texture_count(), 8);
    ring.dispose(&mut backend);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(ring.ids().count(), 0);
}

// ============================================================================
// Camera lifecycle
// ============================================================================

#[test]
fn test_camera_reset_flags_follow_resizes() {
    let mut ctx = TestContext::new(1920, 1080);

    let first = ctx.begin_frame();
    assert!(first.reset_history);

    ctx.camera
        .history_mut()
        .allocate_buffer(&mut ctx.backend, TAA, &color_history(), 2)
        .unwrap();
    let steady = ctx.begin_frame();
    assert!(!steady.reset_history);
    assert!(steady.did_reset_history_last_frame);
    assert!(!ctx.begin_frame().did_reset_history_last_frame);

    ctx.resize(1280, 720);
    let shrunk = ctx.begin_frame();
    assert!(shrunk.reset_history);
    assert!(!ctx.camera.history().is_allocated(TAA));

    let after = ctx.begin_frame();
    assert!(!after.reset_history);
    assert!(after.did_reset_history_last_frame);
    assert_eq!(after.frame_count, 4);
}
