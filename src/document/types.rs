//! Core document types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::render::{IRect, Matrix, Rect, Rotation};

use super::error::RenderError;

/// Memory budget used when none (or a non-positive one) is given
pub const DEFAULT_MEMORY_BUDGET_MIB: i64 = 60;

/// Highest anti-alias level the engine understands
pub const MAX_ANTI_ALIAS_LEVEL: u8 = 8;

/// Document family; selects the native open entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// PDF
    #[default]
    Primary,
    /// XPS
    Secondary,
}

impl DocumentKind {
    /// Detect kind from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Primary),
            "xps" | "oxps" => Some(Self::Secondary),
            _ => None,
        }
    }

    /// Suffix given to temp files holding a byte payload of this kind
    pub fn temp_suffix(&self) -> &'static str {
        match self {
            DocumentKind::Primary => ".pdf",
            DocumentKind::Secondary => ".xps",
        }
    }

    /// Passwords only apply to primary documents
    pub fn supports_password(&self) -> bool {
        matches!(self, DocumentKind::Primary)
    }
}

/// Where a document comes from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    /// In-memory payload, written to a temp file before opening
    Bytes(Vec<u8>),
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::Path(path)
    }
}

impl From<&std::path::Path> for DocumentSource {
    fn from(path: &std::path::Path) -> Self {
        DocumentSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentSource::Bytes(bytes)
    }
}

/// Options for [`DocumentSession::open`](super::DocumentSession::open)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub kind: DocumentKind,
    /// Mebibytes; zero or negative selects [`DEFAULT_MEMORY_BUDGET_MIB`]
    #[serde(default)]
    pub memory_budget_mib: i64,
}

impl OpenOptions {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn memory_budget_mib(mut self, mib: i64) -> Self {
        self.memory_budget_mib = mib;
        self
    }

    /// Effective budget in bytes
    pub fn memory_budget_bytes(&self) -> usize {
        let mib = if self.memory_budget_mib <= 0 {
            DEFAULT_MEMORY_BUDGET_MIB
        } else {
            self.memory_budget_mib
        };
        usize::try_from(mib)
            .unwrap_or(usize::MAX)
            .saturating_mul(1 << 20)
    }
}

/// Document format version, e.g. PDF 1.7
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    /// Decode the engine's `major * 10 + minor`; `None` for unknown (`<= 0`)
    pub fn from_code(code: i32) -> Option<Self> {
        if code <= 0 {
            return None;
        }
        Some(Self {
            major: u8::try_from(code / 10).ok()?,
            minor: (code % 10) as u8,
        })
    }
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Immutable description of one page (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub page: u32,
    /// Page bounds in points
    pub bounds: Rect,
    /// Rotation the page asks for, used by [`Rotation::Auto`]
    pub rotation: i32,
}

impl PageGeometry {
    pub fn width(&self) -> f32 {
        self.bounds.width()
    }

    pub fn height(&self) -> f32 {
        self.bounds.height()
    }

    /// Page-unit area to draw
    ///
    /// Without cropping, or with an all-zero crop, this is the full page;
    /// otherwise the crop clipped to the page.
    pub fn source_rect(&self, crop: Option<&Rect>) -> Result<Rect, RenderError> {
        let rect = match crop {
            Some(crop) if !crop.is_zero() => crop.intersect(&self.bounds),
            _ => self.bounds,
        };
        if rect.is_empty() {
            return Err(RenderError::EmptyArea);
        }
        Ok(rect)
    }

    /// Transform and device pixel rectangle for `source` at `zoom`/`rotation`
    pub fn device_area(
        &self,
        source: &Rect,
        zoom: f32,
        rotation: Rotation,
    ) -> Result<(Matrix, IRect), RenderError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(RenderError::InvalidZoom(zoom));
        }
        let ctm = Matrix::view(zoom, rotation.resolve(self.rotation));
        let area = source.transform(&ctm).round_out();
        if area.is_empty() {
            return Err(RenderError::EmptyArea);
        }
        Ok((ctm, area))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> PageGeometry {
        PageGeometry {
            page: 1,
            bounds: Rect::new(0.0, 0.0, 612.0, 792.0),
            rotation: 0,
        }
    }

    #[test]
    fn test_memory_budget_default() {
        assert_eq!(OpenOptions::default().memory_budget_bytes(), 60 << 20);
        assert_eq!(
            OpenOptions::default().memory_budget_mib(-5).memory_budget_bytes(),
            60 << 20
        );
        assert_eq!(
            OpenOptions::default().memory_budget_mib(128).memory_budget_bytes(),
            128 << 20
        );
        assert_eq!(
            OpenOptions::default().memory_budget_mib(i64::MAX).memory_budget_bytes(),
            usize::MAX
        );
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Primary));
        assert_eq!(DocumentKind::from_extension("xps"), Some(DocumentKind::Secondary));
        assert_eq!(DocumentKind::from_extension("epub"), None);
        assert_eq!(DocumentKind::Secondary.temp_suffix(), ".xps");
    }

    #[test]
    fn test_zero_crop_means_full_page() {
        let page = letter();
        let zero = Rect::default();
        assert_eq!(page.source_rect(Some(&zero)).unwrap(), page.bounds);
        assert_eq!(page.source_rect(None).unwrap(), page.bounds);
    }

    #[test]
    fn test_crop_is_clipped_to_page() {
        let page = letter();
        let crop = Rect::new(500.0, 700.0, 900.0, 900.0);
        assert_eq!(
            page.source_rect(Some(&crop)).unwrap(),
            Rect::new(500.0, 700.0, 612.0, 792.0)
        );

        let outside = Rect::new(700.0, 800.0, 900.0, 900.0);
        assert_eq!(page.source_rect(Some(&outside)), Err(RenderError::EmptyArea));
    }

    #[test]
    fn test_device_area_rejects_bad_zoom() {
        let page = letter();
        assert!(matches!(
            page.device_area(&page.bounds, 0.0, Rotation::Auto),
            Err(RenderError::InvalidZoom(_))
        ));
        assert!(page.device_area(&page.bounds, f32::NAN, Rotation::Auto).is_err());
    }

    #[test]
    fn test_auto_rotation_follows_page() {
        let mut page = letter();
        page.rotation = 90;
        let (_, area) = page.device_area(&page.bounds, 1.0, Rotation::Auto).unwrap();
        assert_eq!((area.width(), area.height()), (792, 612));
        let (_, area) = page.device_area(&page.bounds, 1.0, Rotation::Deg0).unwrap();
        assert_eq!((area.width(), area.height()), (612, 792));
    }

    #[test]
    fn test_pdf_version_codes() {
        let version = PdfVersion::from_code(17).unwrap();
        assert_eq!((version.major, version.minor), (1, 7));
        assert_eq!(version.to_string(), "1.7");
        assert_eq!(PdfVersion::from_code(20).unwrap().to_string(), "2.0");
        assert_eq!(PdfVersion::from_code(0), None);
        assert_eq!(PdfVersion::from_code(-1), None);
    }
}
