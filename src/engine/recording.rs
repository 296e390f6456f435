//! Deterministic in-process engine for tests
//!
//! Documents are small text files of `key=value` lines:
//!
//! ```text
//! %FAKEDOC
//! pages=3
//! width=612
//! height=792
//! rotate=90
//! password=secret
//! open_status=-2
//! fail_raster=true
//! outline=Intro:1;>Details:2;Appendix:3
//! version=17
//! links=1|10,10,100,30|3;2|0,0,50,50|https://example.com
//! ```
//!
//! Primary opens default to version 14; secondary opens report 0.
//!
//! Rasterized pixels are a pure function of the device coordinate, so a
//! tile rendered on its own matches the same region of a full-page render.
//! Every trait call is counted; see [`RecordingEngine::calls`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{
    Handle, NativeEngine, OutlineEntry, PageInfo, PageLink, RasterColorspace, RasterRequest, RawPixmap,
    OPEN_BAD_PASSWORD, OPEN_NEEDS_PASSWORD, STATUS_NO_DOCUMENT, STATUS_OK, STATUS_RASTER_FAILED,
};
use crate::render::Rect;

const MAGIC: &str = "%FAKEDOC";

#[derive(Debug, Clone)]
struct FakeDocument {
    path: PathBuf,
    pages: i32,
    width: f32,
    height: f32,
    rotate: i32,
    fail_raster: bool,
    anti_alias_level: u8,
    outline: Vec<OutlineEntry>,
    version: i32,
    /// `(page, link)` pairs
    links: Vec<(u32, PageLink)>,
}

/// Snapshot of how often each native entry point was hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub opens: usize,
    pub closes: usize,
    pub page_queries: usize,
    pub anti_alias: usize,
    pub rasterizations: usize,
    pub outlines: usize,
    /// Version and link lookups
    pub metadata: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.opens
            + self.closes
            + self.page_queries
            + self.anti_alias
            + self.rasterizations
            + self.outlines
            + self.metadata
    }
}

/// Fake [`NativeEngine`] that records its traffic
#[derive(Default)]
pub struct RecordingEngine {
    documents: Mutex<HashMap<Handle, FakeDocument>>,
    next_handle: AtomicI64,
    opens: AtomicUsize,
    closes: AtomicUsize,
    page_queries: AtomicUsize,
    anti_alias: AtomicUsize,
    rasterizations: AtomicUsize,
    outlines: AtomicUsize,
    metadata: AtomicUsize,
    last_request: Mutex<Option<RasterRequest>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// Fixture text for an unencrypted document with `pages` pages
    pub fn fixture(pages: u32, width: f32, height: f32) -> String {
        format!("{MAGIC}\npages={pages}\nwidth={width}\nheight={height}\n")
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            opens: self.opens.load(Ordering::SeqCst),
            closes: self.closes.load(Ordering::SeqCst),
            page_queries: self.page_queries.load(Ordering::SeqCst),
            anti_alias: self.anti_alias.load(Ordering::SeqCst),
            rasterizations: self.rasterizations.load(Ordering::SeqCst),
            outlines: self.outlines.load(Ordering::SeqCst),
            metadata: self.metadata.load(Ordering::SeqCst),
        }
    }

    /// The most recent rasterization request
    pub fn last_request(&self) -> Option<RasterRequest> {
        *self.last_request.lock()
    }

    pub fn open_handles(&self) -> usize {
        self.documents.lock().len()
    }

    /// Pixel pattern at device coordinate `(x, y)` as `(r, g, b)`
    pub fn pattern_rgb(x: i32, y: i32) -> [u8; 3] {
        [
            x.rem_euclid(256) as u8,
            y.rem_euclid(256) as u8,
            (x + y).rem_euclid(256) as u8,
        ]
    }

    /// Gray pattern at device coordinate `(x, y)`
    pub fn pattern_gray(x: i32, y: i32) -> u8 {
        (x * 7 + y * 13).rem_euclid(256) as u8
    }

    fn open_fixture(&self, path: &Path, password: Option<&str>, allow_password: bool) -> Handle {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let Ok(text) = std::fs::read_to_string(path) else {
            return -1;
        };
        let mut lines = text.lines();
        if lines.next().map(str::trim) != Some(MAGIC) {
            return -2;
        }

        let mut doc = FakeDocument {
            path: path.to_path_buf(),
            pages: 1,
            width: 612.0,
            height: 792.0,
            rotate: 0,
            fail_raster: false,
            anti_alias_level: 8,
            outline: Vec::new(),
            version: if allow_password { 14 } else { 0 },
            links: Vec::new(),
        };
        let mut required_password: Option<String> = None;

        for line in lines {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "pages" => doc.pages = value.parse().unwrap_or(0),
                "width" => doc.width = value.parse().unwrap_or(0.0),
                "height" => doc.height = value.parse().unwrap_or(0.0),
                "rotate" => doc.rotate = value.parse().unwrap_or(0),
                "fail_raster" => doc.fail_raster = value == "true",
                "password" => required_password = Some(value.to_string()),
                "open_status" => return value.parse().unwrap_or(-3),
                "outline" => doc.outline = parse_outline(value),
                "version" => doc.version = value.parse().unwrap_or(0),
                "links" => doc.links = parse_links(value),
                _ => {}
            }
        }

        if let Some(required) = required_password {
            if !allow_password {
                return OPEN_NEEDS_PASSWORD;
            }
            match password {
                None => return OPEN_NEEDS_PASSWORD,
                Some(pw) if pw != required => return OPEN_BAD_PASSWORD,
                Some(_) => {}
            }
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().insert(handle, doc);
        handle
    }
}

/// `Title:page` items separated by `;`, each leading `>` adds one level
fn parse_outline(value: &str) -> Vec<OutlineEntry> {
    value
        .split(';')
        .filter(|item| !item.is_empty())
        .map(|item| {
            let depth = item.chars().take_while(|c| *c == '>').count();
            let item = &item[depth..];
            let (title, page) = match item.rsplit_once(':') {
                Some((title, page)) => (title, page.parse().ok()),
                None => (item, None),
            };
            OutlineEntry {
                title: title.to_string(),
                page,
                uri: None,
                depth: depth as u16,
            }
        })
        .collect()
}

/// `page|x0,y0,x1,y1|target` items separated by `;`; a numeric target is a
/// page, anything else a URI
fn parse_links(value: &str) -> Vec<(u32, PageLink)> {
    value
        .split(';')
        .filter_map(|item| {
            let mut parts = item.splitn(3, '|');
            let page: u32 = parts.next()?.trim().parse().ok()?;
            let coords: Vec<f32> = parts
                .next()?
                .split(',')
                .map(|c| c.trim().parse())
                .collect::<Result<_, _>>()
                .ok()?;
            let [x0, y0, x1, y1] = coords[..] else {
                return None;
            };
            let target = parts.next()?.trim();
            let link = match target.parse::<u32>() {
                Ok(to) => PageLink {
                    bounds: Rect::new(x0, y0, x1, y1),
                    page: Some(to),
                    uri: None,
                },
                Err(_) => PageLink {
                    bounds: Rect::new(x0, y0, x1, y1),
                    page: None,
                    uri: Some(target.to_string()),
                },
            };
            Some((page, link))
        })
        .collect()
}

impl NativeEngine for RecordingEngine {
    fn open_primary(&self, path: &Path, password: Option<&str>, _memory_budget: usize) -> Handle {
        self.open_fixture(path, password, true)
    }

    fn open_secondary(&self, path: &Path, _memory_budget: usize) -> Handle {
        self.open_fixture(path, None, false)
    }

    fn close(&self, handle: Handle) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().remove(&handle);
    }

    fn page_count(&self, handle: Handle) -> i32 {
        self.page_queries.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .get(&handle)
            .map(|d| d.pages)
            .unwrap_or(0)
    }

    fn page_info(&self, handle: Handle, page: u32) -> Option<PageInfo> {
        self.page_queries.fetch_add(1, Ordering::SeqCst);
        let docs = self.documents.lock();
        let doc = docs.get(&handle)?;
        if page == 0 || page as i32 > doc.pages {
            return None;
        }
        Some(PageInfo {
            bounds: Rect::new(0.0, 0.0, doc.width, doc.height),
            rotation: doc.rotate,
        })
    }

    fn anti_alias_level(&self, handle: Handle) -> i32 {
        self.anti_alias.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .get(&handle)
            .map(|d| d.anti_alias_level as i32)
            .unwrap_or(-1)
    }

    fn set_anti_alias_level(&self, handle: Handle, level: u8) -> i32 {
        self.anti_alias.fetch_add(1, Ordering::SeqCst);
        match self.documents.lock().get_mut(&handle) {
            Some(doc) => {
                doc.anti_alias_level = level;
                STATUS_OK
            }
            None => STATUS_NO_DOCUMENT,
        }
    }

    fn rasterize(&self, handle: Handle, request: &RasterRequest) -> Result<RawPixmap, i32> {
        self.rasterizations.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(*request);

        let fail = {
            let docs = self.documents.lock();
            let doc = docs.get(&handle).ok_or(STATUS_NO_DOCUMENT)?;
            if request.page == 0 || request.page as i32 > doc.pages {
                return Err(STATUS_RASTER_FAILED);
            }
            tracing::trace!("fake raster of {} page {}", doc.path.display(), request.page);
            doc.fail_raster
        };
        if fail {
            return Err(STATUS_RASTER_FAILED);
        }

        let area = request.area;
        let n: u8 = match (request.colorspace, request.alpha) {
            (RasterColorspace::Rgb, false) => 3,
            (RasterColorspace::Rgb, true) => 4,
            (RasterColorspace::Gray, false) => 1,
            (RasterColorspace::Gray, true) => 2,
        };

        let mut samples = Vec::with_capacity(area.area() as usize * n as usize);
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                match request.colorspace {
                    RasterColorspace::Rgb => samples.extend_from_slice(&Self::pattern_rgb(x, y)),
                    RasterColorspace::Gray => samples.push(Self::pattern_gray(x, y)),
                }
                if request.alpha {
                    samples.push(255);
                }
            }
        }

        Ok(RawPixmap {
            width: area.width(),
            height: area.height(),
            n,
            samples,
        })
    }

    fn outline(&self, handle: Handle) -> Vec<OutlineEntry> {
        self.outlines.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .get(&handle)
            .map(|d| d.outline.clone())
            .unwrap_or_default()
    }

    fn version(&self, handle: Handle) -> i32 {
        self.metadata.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .get(&handle)
            .map(|d| d.version)
            .unwrap_or(0)
    }

    fn page_links(&self, handle: Handle, page: u32) -> Vec<PageLink> {
        self.metadata.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .get(&handle)
            .map(|d| {
                d.links
                    .iter()
                    .filter(|(on, _)| *on == page)
                    .map(|(_, link)| link.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outline_depths() {
        let entries = parse_outline("Intro:1;>Details:2;>>Deep;Appendix:3");
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].depth, 1);
        assert_eq!(entries[1].page, Some(2));
        assert_eq!(entries[2].title, "Deep");
        assert_eq!(entries[2].page, None);
        assert_eq!(entries[3].depth, 0);
    }

    #[test]
    fn test_parse_links_targets() {
        let links = parse_links("1|10,10,100,30|3;2|0,0,50,50|https://example.com;x|1,2|4");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].0, 1);
        assert_eq!(links[0].1.page, Some(3));
        assert_eq!(links[0].1.bounds, Rect::new(10.0, 10.0, 100.0, 30.0));
        assert_eq!(links[1].1.uri.as_deref(), Some("https://example.com"));
        assert_eq!(links[1].1.page, None);
    }

    #[test]
    fn test_pattern_handles_negative_coordinates() {
        assert_eq!(RecordingEngine::pattern_rgb(-1, 0), [255, 0, 255]);
        assert_eq!(RecordingEngine::pattern_gray(0, 0), 0);
    }
}
