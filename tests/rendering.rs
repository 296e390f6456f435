//! Page rendering through the recording engine

mod common;

use common::Fixture;
use docraster::document::RenderError;
use docraster::engine::{RasterColorspace, RecordingEngine};
use docraster::render::{ColorMode, IRect, PageRenderer, Rect, RenderSpec, Rotation};

#[test]
fn full_page_render_matches_engine_pattern() {
    let fx = Fixture::new();
    let path = fx.document(1, 60.0, 40.0);
    let session = fx.open(&path);

    let mut renderer = PageRenderer::new(&session, 1, RenderSpec::new(2.0, Rotation::Auto, ColorMode::Rgb));
    let buffer = renderer.render(false).unwrap();

    assert_eq!((buffer.width(), buffer.height()), (120, 80));
    assert_eq!(buffer.resolution_dpi(), 144.0);
    let data = buffer.data();
    let at = |x: usize, y: usize| &data[(y * 120 + x) * 3..(y * 120 + x) * 3 + 3];
    assert_eq!(at(0, 0), RecordingEngine::pattern_rgb(0, 0));
    assert_eq!(at(119, 79), RecordingEngine::pattern_rgb(119, 79));
}

#[test]
fn each_render_is_one_rasterization() {
    let fx = Fixture::new();
    let path = fx.document(2, 50.0, 50.0);
    let session = fx.open(&path);
    let mut renderer = PageRenderer::new(&session, 2, RenderSpec::default());

    let before = fx.engine.calls().rasterizations;
    renderer.render(false).unwrap();
    assert_eq!(fx.engine.calls().rasterizations, before + 1);

    renderer.dispose();
    assert!(renderer.buffer().is_none());
    renderer.render(false).unwrap();
    assert_eq!(fx.engine.calls().rasterizations, before + 2);
    assert!(renderer.take_buffer().is_some());
    assert!(renderer.buffer().is_none());
}

#[test]
fn crop_applies_only_when_requested() {
    let fx = Fixture::new();
    let path = fx.document(1, 100.0, 100.0);
    let session = fx.open(&path);

    let spec = RenderSpec::new(2.0, Rotation::Deg0, ColorMode::Gray)
        .with_crop(Rect::new(10.0, 10.0, 30.0, 20.0));
    let mut renderer = PageRenderer::new(&session, 1, spec);

    let cropped = renderer.render(true).unwrap();
    assert_eq!((cropped.width(), cropped.height()), (40, 20));
    let request = fx.engine.last_request().unwrap();
    assert_eq!(request.area, IRect::new(20, 20, 60, 40));
    assert_eq!(request.colorspace, RasterColorspace::Gray);

    let full = renderer.render(false).unwrap();
    assert_eq!((full.width(), full.height()), (200, 200));
}

#[test]
fn zero_crop_renders_full_page_and_disjoint_crop_fails() {
    let fx = Fixture::new();
    let path = fx.document(1, 100.0, 50.0);
    let session = fx.open(&path);

    let spec = RenderSpec::new(1.0, Rotation::Deg0, ColorMode::Rgb).with_crop(Rect::default());
    let mut renderer = PageRenderer::new(&session, 1, spec);
    let buffer = renderer.render(true).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (100, 50));

    renderer.set_spec(spec.with_crop(Rect::new(200.0, 200.0, 300.0, 300.0)));
    assert_eq!(renderer.render(true).unwrap_err(), RenderError::EmptyArea);
}

#[test]
fn auto_rotation_uses_page_hint() {
    let fx = Fixture::new();
    let path = fx.document_with(1, 100.0, 50.0, "rotate=90");
    let session = fx.open(&path);

    let mut auto = PageRenderer::new(&session, 1, RenderSpec::new(1.0, Rotation::Auto, ColorMode::Gray));
    let buffer = auto.render(false).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (50, 100));

    let mut upright = PageRenderer::new(&session, 1, RenderSpec::new(1.0, Rotation::Deg0, ColorMode::Gray));
    let buffer = upright.render(false).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (100, 50));
}

#[test]
fn color_modes_shape_buffers() {
    let fx = Fixture::new();
    let path = fx.document(1, 20.0, 10.0);
    let session = fx.open(&path);

    for color in ColorMode::ALL {
        let mut renderer = PageRenderer::new(&session, 1, RenderSpec::new(1.0, Rotation::Deg0, color));
        let buffer = renderer.render(false).unwrap();
        assert_eq!(buffer.color(), color);
        assert_eq!(buffer.byte_len(), 200 * color.bytes_per_pixel());
        if color.is_binary() {
            assert!(buffer.data().iter().all(|v| *v == 0 || *v == 255));
        }
        let request = fx.engine.last_request().unwrap();
        assert_eq!(request.alpha, color == ColorMode::Argb);
    }
}

#[test]
fn render_errors_are_reported() {
    let fx = Fixture::new();
    let path = fx.document_with(2, 20.0, 20.0, "fail_raster=true");
    let session = fx.open(&path);

    let mut renderer = PageRenderer::new(&session, 3, RenderSpec::default());
    assert_eq!(
        renderer.render(false).unwrap_err(),
        RenderError::PageOutOfRange { page: 3, count: 2 }
    );

    let mut renderer = PageRenderer::new(&session, 1, RenderSpec::default());
    assert_eq!(renderer.render(false).unwrap_err(), RenderError::Native { code: -2 });

    let mut renderer = PageRenderer::new(&session, 1, RenderSpec::new(-1.0, Rotation::Auto, ColorMode::Rgb));
    assert!(matches!(renderer.render(false).unwrap_err(), RenderError::InvalidZoom(_)));
}

#[test]
fn renderer_from_geometry_and_anti_alias_level() {
    let fx = Fixture::new();
    let path = fx.document(1, 30.0, 30.0);
    let mut session = fx.open(&path);
    assert!(session.set_anti_alias_level(2));

    let geometry = session.page_geometry(1).unwrap();
    let mut renderer = PageRenderer::with_geometry(&session, geometry, RenderSpec::default());
    renderer.render(false).unwrap();
    assert_eq!(renderer.page(), 1);
    assert_eq!(fx.engine.last_request().unwrap().anti_alias_level, 2);
}
