//! Full-page export through the session conveniences

mod common;

use common::Fixture;
use docraster::document::ExportError;
use docraster::export::{tiff_page_count, ExportFormat, RasterExporter, TiffCompression, TiffWriteMode};
use docraster::render::ColorMode;

#[test]
fn ccitt_t6_tiff_appends_pages() {
    let fx = Fixture::new();
    let path = fx.document(1, 64.0, 32.0);
    let session = fx.open(&path);
    let out = fx.output("scan.tif");

    for _ in 0..2 {
        session
            .save_as_tiff(1, &out, 1.0, ColorMode::Binary, TiffCompression::CcittT6, TiffWriteMode::Append, 0)
            .unwrap();
    }
    assert_eq!(tiff_page_count(&out).unwrap(), 2);

    session
        .save_as_tiff(1, &out, 1.0, ColorMode::Binary, TiffCompression::CcittT6, TiffWriteMode::Discard, 0)
        .unwrap();
    assert_eq!(tiff_page_count(&out).unwrap(), 1);
}

#[test]
fn hard_rejections_happen_before_rasterizing() {
    let fx = Fixture::new();
    let path = fx.document(1, 32.0, 32.0);
    let session = fx.open(&path);
    let before = fx.engine.calls();

    let png = fx.output("page.png");
    assert_eq!(
        session.save_as_png(1, &png, 1.0, ColorMode::Binary),
        Err(ExportError::InvalidColorMode {
            format: ExportFormat::Png,
            color: ColorMode::Binary.code()
        })
    );

    let tif = fx.output("page.tif");
    assert_eq!(
        session.save_as_tiff(1, &tif, 1.0, ColorMode::Argb, TiffCompression::CcittT4, TiffWriteMode::Discard, 0),
        Err(ExportError::InvalidCompressionForColorMode {
            compression: TiffCompression::CcittT4,
            color: ColorMode::Argb
        })
    );

    let jpg = fx.output("page.jpg");
    assert!(matches!(
        session.save_as_jpeg(1, &jpg, 1.0, ColorMode::Argb, 90),
        Err(ExportError::InvalidColorMode { .. })
    ));

    assert_eq!(fx.engine.calls(), before);
    assert!(!png.exists() && !tif.exists() && !jpg.exists());
}

#[test]
fn tiff_codes_are_checked_in_order() {
    assert_eq!(
        RasterExporter::tiff_from_codes(9, 99, 7, 0).err(),
        Some(ExportError::InvalidColorMode {
            format: ExportFormat::Tiff,
            color: 9
        })
    );
    assert_eq!(
        RasterExporter::tiff_from_codes(1, 99, 7, 0).err(),
        Some(ExportError::InvalidMode(7))
    );
    assert_eq!(
        RasterExporter::tiff_from_codes(1, 99, 0, 0).err(),
        Some(ExportError::InvalidCompression(99))
    );
    assert!(matches!(
        RasterExporter::tiff_from_codes(1, 4, 0, 0),
        Err(ExportError::InvalidCompressionForColorMode { .. })
    ));

    let (exporter, color) = RasterExporter::tiff_from_codes(4, 4, 0, 0).unwrap();
    assert_eq!(color, ColorMode::Binary);
    let plan = exporter.resolve(color).unwrap();
    assert_eq!(plan.compression, TiffCompression::CcittT6);
    assert_eq!(plan.mode, TiffWriteMode::Append);
}

#[test]
fn out_of_range_quality_uses_defaults() {
    let fx = Fixture::new();
    let path = fx.document(1, 40.0, 30.0);
    let session = fx.open(&path);

    let clamped = fx.output("q150.jpg");
    let default = fx.output("q75.jpg");
    session.save_as_jpeg(1, &clamped, 1.0, ColorMode::Rgb, 150).unwrap();
    session.save_as_jpeg(1, &default, 1.0, ColorMode::Rgb, 75).unwrap();
    assert_eq!(std::fs::read(&clamped).unwrap(), std::fs::read(&default).unwrap());

    let level0 = fx.output("l0.tif");
    let level6 = fx.output("l6.tif");
    for (out, level) in [(&level0, 0), (&level6, 6)] {
        session
            .save_as_tiff(1, out, 1.0, ColorMode::Gray, TiffCompression::Deflate, TiffWriteMode::Discard, level)
            .unwrap();
    }
    assert_eq!(std::fs::read(&level0).unwrap(), std::fs::read(&level6).unwrap());
}

#[test]
fn every_format_writes_its_signature() {
    let fx = Fixture::new();
    let path = fx.document(1, 24.0, 16.0);
    let session = fx.open(&path);

    let cases: [(&str, &[u8]); 8] = [
        ("page.png", b"\x89PNG"),
        ("page.jpg", &[0xFF, 0xD8]),
        ("page.bmp", b"BM"),
        ("rgb.pnm", b"P6"),
        ("gray.pnm", b"P5"),
        ("page.pam", b"P7"),
        ("page.pbm", b"P4"),
        ("page.tif", b"II*\0"),
    ];
    for (name, magic) in cases {
        let out = fx.output(name);
        match name {
            "page.png" => session.save_as_png(1, &out, 1.0, ColorMode::Argb),
            "page.jpg" => session.save_as_jpeg(1, &out, 1.0, ColorMode::Gray, 80),
            "page.bmp" => session.save_as_bmp(1, &out, 1.0, ColorMode::BinaryDithered),
            "rgb.pnm" => session.save_as_pnm(1, &out, 1.0, ColorMode::Rgb),
            "gray.pnm" => session.save_as_pnm(1, &out, 1.0, ColorMode::Gray),
            "page.pam" => session.save_as_pam(1, &out, 1.0, ColorMode::Rgb),
            "page.pbm" => session.save_as_pbm(1, &out, 1.0),
            _ => session.save_as_tiff(1, &out, 1.0, ColorMode::Rgb, TiffCompression::Jpeg, TiffWriteMode::Discard, 200),
        }
        .unwrap();
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(magic), "{name}");
    }

    let png = image::open(fx.output("page.png")).unwrap();
    assert_eq!((png.width(), png.height()), (24, 16));
    assert!(png.color().has_alpha());
}

#[test]
fn pbm_is_packed_one_bit_per_pixel() {
    let fx = Fixture::new();
    let path = fx.document(1, 20.0, 10.0);
    let session = fx.open(&path);
    let out = fx.output("page.pbm");

    session.save_as_pbm(1, &out, 1.0).unwrap();
    let bytes = std::fs::read(&out).unwrap();
    let header = b"P4\n20 10\n";
    assert!(bytes.starts_with(header));
    assert_eq!(bytes.len(), header.len() + 3 * 10);
}

#[test]
fn zoom_scales_output_dimensions() {
    let fx = Fixture::new();
    let path = fx.document(1, 30.0, 20.0);
    let session = fx.open(&path);
    let out = fx.output("zoomed.png");

    session.save_as_png(1, &out, 2.5, ColorMode::Gray).unwrap();
    let img = image::open(&out).unwrap();
    assert_eq!((img.width(), img.height()), (75, 50));
}

#[test]
fn failures_map_to_status_codes() {
    let fx = Fixture::new();
    let broken = fx.document_with(1, 20.0, 20.0, "fail_raster=true");
    let session = fx.open(&broken);
    assert_eq!(
        session.save_as_png(1, fx.output("x.png"), 1.0, ColorMode::Rgb),
        Err(ExportError::EncodeFailed { code: -2 })
    );
    assert_eq!(
        session.save_as_png(2, fx.output("y.png"), 1.0, ColorMode::Rgb),
        Err(ExportError::EncodeFailed { code: -2 })
    );

    let fx = Fixture::new();
    let path = fx.document(1, 20.0, 20.0);
    let session = fx.open(&path);
    let unwritable = fx.output("missing-dir").join("page.png");
    assert_eq!(
        session.save_as_png(1, &unwritable, 1.0, ColorMode::Rgb),
        Err(ExportError::EncodeFailed { code: -3 })
    );
    assert_eq!(
        session.save_as_tiff(1, &unwritable, 1.0, ColorMode::Gray, TiffCompression::None, TiffWriteMode::Append, 0),
        Err(ExportError::EncodeFailed { code: -3 })
    );
}
