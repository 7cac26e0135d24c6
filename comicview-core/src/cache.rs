//! Sliding window of decoded spreads around the reading position.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use crate::backend::PageDecoder;
use crate::layout::SpreadLayout;
use crate::model::{PaginationMode, Page};

pub const DEFAULT_WINDOW_SIZE: usize = 8;
const MIN_WINDOW_SIZE: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub decoded: usize,
    pub released: usize,
    pub failed: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub resident_pages: usize,
    pub bytes: usize,
}

pub fn memory_usage(pages: &[Page]) -> MemoryUsage {
    pages
        .iter()
        .filter_map(Page::bitmap)
        .fold(MemoryUsage::default(), |usage, bitmap| MemoryUsage {
            resident_pages: usage.resident_pages + 1,
            bytes: usage.bytes + bitmap.byte_len(),
        })
}

/// Decides which pages keep a bitmap resident.
///
/// Single and paired layouts keep the spreads in
/// `[current - size/2 + 1, current + size/2 - 1]` decoded. Strip layouts keep
/// every visible page decoded, so their memory grows with the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeWindow {
    size: usize,
}

impl Default for DecodeWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl DecodeWindow {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(MIN_WINDOW_SIZE),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Spread indices that stay decoded around `current`.
    pub fn range(&self, current: usize, spread_count: usize) -> Option<RangeInclusive<usize>> {
        let last = spread_count.checked_sub(1)?;
        let current = current.min(last);
        let half = self.size / 2;
        let start = (current + 1).saturating_sub(half);
        let end = (current + half - 1).min(last);
        Some(start..=end)
    }

    /// Builds the page sequence for freshly extracted files: the first
    /// `size` pages are decoded, the rest only probed for dimensions.
    #[instrument(skip_all, fields(pages = paths.len(), window = self.size))]
    pub fn bootstrap(&self, paths: Vec<PathBuf>, decoder: &dyn PageDecoder) -> Vec<Page> {
        let eager = self.size.min(paths.len());
        let decoded = decoder.decode_batch(&paths[..eager]);
        let probed = decoder.probe_batch(&paths[eager..]);

        let mut pages = Vec::with_capacity(paths.len());
        for (index, (path, result)) in paths[..eager].iter().zip(decoded).enumerate() {
            match result {
                Ok(bitmap) => {
                    let mut page = Page::new(path, Some((bitmap.width, bitmap.height)));
                    page.load(bitmap);
                    pages.push(page);
                }
                Err(err) => {
                    warn!(page = index, error = %err, "failed to decode page");
                    pages.push(Page::new(path, None));
                }
            }
        }
        for (offset, (path, result)) in paths[eager..].iter().zip(probed).enumerate() {
            let dimensions = match result {
                Ok(dimensions) => Some(dimensions),
                Err(err) => {
                    warn!(page = eager + offset, error = %err, "failed to read page dimensions");
                    None
                }
            };
            pages.push(Page::new(path, dimensions));
        }
        pages
    }

    /// Pages that must be resident while `current` is on screen.
    pub fn wanted_pages(&self, page_count: usize, layout: &SpreadLayout, current: usize) -> Vec<bool> {
        let mut wanted = vec![false; page_count];
        let spreads = if layout.mode() == PaginationMode::Strip {
            Some(0..=layout.len().saturating_sub(1)).filter(|_| !layout.is_empty())
        } else {
            self.range(current, layout.len())
        };
        if let Some(spreads) = spreads {
            for spread in &layout.spreads()[spreads] {
                for &page in spread.pages() {
                    wanted[page] = true;
                }
            }
        }
        wanted
    }

    /// Releases pages outside the window and decodes missing pages inside it.
    /// Decode failures leave the page unloaded and do not stop the refresh.
    #[instrument(skip(self, pages, layout, decoder), fields(window = self.size, mode = %layout.mode()))]
    pub fn refresh(
        &self,
        pages: &mut [Page],
        layout: &SpreadLayout,
        current: usize,
        decoder: &dyn PageDecoder,
    ) -> RefreshReport {
        let wanted = self.wanted_pages(pages.len(), layout, current);
        let mut report = RefreshReport::default();

        for (page, keep) in pages.iter_mut().zip(&wanted) {
            if !keep && page.unload() {
                report.released += 1;
            }
        }

        let pending: Vec<usize> = (0..pages.len())
            .filter(|&index| wanted[index] && !pages[index].is_loaded())
            .collect();
        if layout.mode() == PaginationMode::Strip && !pending.is_empty() {
            debug!(pending = pending.len(), "strip layout decodes every visible page");
        }
        let paths: Vec<PathBuf> = pending
            .iter()
            .map(|&index| pages[index].path().to_path_buf())
            .collect();
        let results = decoder.decode_batch(&paths);

        for (index, result) in pending.into_iter().zip(results) {
            match result {
                Ok(bitmap) => {
                    pages[index].load(bitmap);
                    report.decoded += 1;
                }
                Err(err) => {
                    warn!(page = index, error = %err, "failed to decode page");
                    report.failed.push(index);
                }
            }
        }

        debug!(
            decoded = report.decoded,
            released = report.released,
            failed = report.failed.len(),
            "decode window refreshed"
        );
        report
    }
}
