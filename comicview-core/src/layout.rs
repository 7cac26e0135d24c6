//! Grouping of the page sequence into display spreads.
//!
//! Layouts are always rebuilt from scratch; a spread only stores indices into
//! the session's page sequence, so span and visibility edits are picked up by
//! the next [`SpreadLayout::compute`] without any resynchronisation.

use crate::model::{PaginationMode, Page, ReadingDirection, Span};

/// Pages shown together at one navigation position, in ascending page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spread {
    pages: Vec<usize>,
}

impl Spread {
    fn solo(page: usize) -> Self {
        Self { pages: vec![page] }
    }

    fn pair(verso: usize, recto: usize) -> Self {
        Self {
            pages: vec![verso, recto],
        }
    }

    pub fn pages(&self) -> &[usize] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, page: usize) -> bool {
        self.pages.binary_search(&page).is_ok()
    }

    /// Lowest page index in the spread.
    pub fn verso(&self) -> usize {
        self.pages[0]
    }

    /// Second page of a two-page spread.
    pub fn recto(&self) -> Option<usize> {
        match self.pages.as_slice() {
            [_, recto] => Some(*recto),
            _ => None,
        }
    }

    /// Pages in the order they are laid out on screen.
    pub fn display_order(&self, direction: ReadingDirection) -> Vec<usize> {
        let mut order = self.pages.clone();
        if direction == ReadingDirection::RightToLeft {
            order.reverse();
        }
        order
    }
}

/// The spreads produced for one pagination mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadLayout {
    mode: PaginationMode,
    spreads: Vec<Spread>,
}

impl SpreadLayout {
    pub fn compute(pages: &[Page], mode: PaginationMode) -> Self {
        let spreads = match mode {
            PaginationMode::Single => visible(pages).map(Spread::solo).collect(),
            PaginationMode::Paired => paired(pages),
            PaginationMode::Strip => {
                let all: Vec<usize> = visible(pages).collect();
                if all.is_empty() {
                    Vec::new()
                } else {
                    vec![Spread { pages: all }]
                }
            }
        };
        Self { mode, spreads }
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    pub fn spreads(&self) -> &[Spread] {
        &self.spreads
    }

    pub fn spread(&self, index: usize) -> Option<&Spread> {
        self.spreads.get(index)
    }

    pub fn len(&self) -> usize {
        self.spreads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spreads.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.spreads.len().checked_sub(1)
    }

    /// Spread that shows `page`. A hidden page maps to the first spread after
    /// it; pages past the end clamp to the last spread.
    pub fn page_to_spread(&self, page: usize) -> Option<usize> {
        let last = self.last_index()?;
        let found = self
            .spreads
            .partition_point(|spread| spread.pages[spread.pages.len() - 1] < page);
        Some(found.min(last))
    }
}

fn visible(pages: &[Page]) -> impl Iterator<Item = usize> + '_ {
    pages
        .iter()
        .enumerate()
        .filter(|(_, page)| !page.is_hidden())
        .map(|(index, _)| index)
}

fn next_visible(pages: &[Page], from: usize) -> Option<usize> {
    (from..pages.len()).find(|&index| !pages[index].is_hidden())
}

fn paired(pages: &[Page]) -> Vec<Spread> {
    let mut spreads = Vec::new();
    let mut index = 0;
    while index < pages.len() {
        let page = &pages[index];
        if page.is_hidden() {
            index += 1;
            continue;
        }
        if page.span() == Span::Double {
            spreads.push(Spread::solo(index));
            index += 1;
            continue;
        }
        match next_visible(pages, index + 1) {
            None => {
                spreads.push(Spread::solo(index));
                break;
            }
            Some(next) if pages[next].span() == Span::Double => {
                spreads.push(Spread::solo(index));
                spreads.push(Spread::solo(next));
                index = next + 1;
            }
            Some(next) => {
                spreads.push(Spread::pair(index, next));
                index = next + 1;
            }
        }
    }
    spreads
}
