//! Rendering options, loadable from JSON.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{mm_to_twips, MarginsTwips, SectionKind, A4_HEIGHT_TWIPS, A4_WIDTH_TWIPS};
use crate::walk::{Strategy, DEFAULT_FONT_SIZE_PT};

pub const DEFAULT_MARGIN_MM: f64 = 20.0;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
/// Header and footer text is set smaller than the body.
pub const HEADER_FOOTER_FONT_RATIO: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
}

impl PageSize {
    /// `(width, height)` in twips.
    pub fn twips(self) -> (u32, u32) {
        match self {
            PageSize::A4 => (A4_WIDTH_TWIPS, A4_HEIGHT_TWIPS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: DEFAULT_MARGIN_MM,
            right: DEFAULT_MARGIN_MM,
            bottom: DEFAULT_MARGIN_MM,
            left: DEFAULT_MARGIN_MM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    #[serde(rename = "pageSize", alias = "page_size")]
    pub page_size: PageSize,
    pub margins_mm: Margins,
}

impl PageGeometry {
    pub fn margins_twips(&self) -> MarginsTwips {
        MarginsTwips {
            top: mm_to_twips(self.margins_mm.top),
            right: mm_to_twips(self.margins_mm.right),
            bottom: mm_to_twips(self.margins_mm.bottom),
            left: mm_to_twips(self.margins_mm.left),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub geometry: PageGeometry,
    /// Body font size in points.
    pub font_size_pt: f32,
    pub strategy: Strategy,
    pub fetch_timeout_secs: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            font_size_pt: DEFAULT_FONT_SIZE_PT,
            strategy: Strategy::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl RenderOptions {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Default run size for a section, in points.
    pub fn section_font_pt(&self, kind: SectionKind) -> f32 {
        match kind {
            SectionKind::Body => self.font_size_pt,
            SectionKind::Header | SectionKind::Footer => {
                (self.font_size_pt * HEADER_FOOTER_FONT_RATIO).round()
            }
        }
    }
}
