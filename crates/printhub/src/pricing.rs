//! Page and cost arithmetic.
//!
//! Everything here is pure: the same input always yields the same quote, so
//! a client-side estimate and the server-side figure agree.

use serde::Serialize;

use crate::order::{ColorMode, FileEntry};

/// Currency the shop charges in.
pub const CURRENCY: &str = "Taka";

pub const BW_PRICE_PER_PAGE: u64 = 2;
pub const COLOR_PRICE_PER_PAGE: u64 = 3;

pub fn price_per_page(color: ColorMode) -> u64 {
    match color {
        ColorMode::Bw => BW_PRICE_PER_PAGE,
        ColorMode::Color => COLOR_PRICE_PER_PAGE,
    }
}

/// Raw print settings of one file, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintSpec {
    pub page_count: i64,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub color: ColorMode,
    pub copies: i64,
}

/// Totals for a set of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub total_pages: u64,
    pub total_cost: u64,
}

/// Missing or non-positive page counts count as a single page.
pub fn normalize_page_count(page_count: i64) -> u32 {
    clamp_to_u32(page_count.max(1))
}

/// Non-positive copies print once.
pub fn normalize_copies(copies: i64) -> u32 {
    clamp_to_u32(copies.max(1))
}

/// A stored bound is only kept when it is a positive page number.
pub fn normalize_bound(bound: Option<i64>) -> Option<u32> {
    bound.filter(|b| *b > 0).map(clamp_to_u32)
}

fn clamp_to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// The page range to print, with both ends clamped into `1..=page_count`.
///
/// A range applies only when both ends are set and `to >= from`. Zero counts
/// as unset; a negative start is clamped to the first page.
pub fn clamped_range(spec: &PrintSpec) -> Option<(u32, u32)> {
    let page_count = i64::from(normalize_page_count(spec.page_count));
    let set = |bound: Option<i64>| bound.filter(|b| *b != 0);
    match (set(spec.from), set(spec.to)) {
        (Some(from), Some(to)) if to >= from => Some((
            clamp_to_u32(from.clamp(1, page_count)),
            clamp_to_u32(to.clamp(1, page_count)),
        )),
        _ => None,
    }
}

/// Pages of one copy that will be printed. Without a usable range the whole
/// document prints.
pub fn effective_pages(spec: &PrintSpec) -> u64 {
    match clamped_range(spec) {
        Some((from, to)) => u64::from(to - from) + 1,
        None => u64::from(normalize_page_count(spec.page_count)),
    }
}

pub fn printed_pages_for(spec: &PrintSpec) -> u64 {
    effective_pages(spec).saturating_mul(u64::from(normalize_copies(spec.copies)))
}

pub fn cost_for(spec: &PrintSpec) -> u64 {
    printed_pages_for(spec).saturating_mul(price_per_page(spec.color))
}

/// Sums printed pages and cost over all files.
pub fn quote<I>(specs: I) -> PriceQuote
where
    I: IntoIterator<Item = PrintSpec>,
{
    specs.into_iter().fold(
        PriceQuote {
            total_pages: 0,
            total_cost: 0,
        },
        |acc, spec| PriceQuote {
            total_pages: acc.total_pages.saturating_add(printed_pages_for(&spec)),
            total_cost: acc.total_cost.saturating_add(cost_for(&spec)),
        },
    )
}

/// Quote for files that already belong to an order.
pub fn quote_entries(entries: &[FileEntry]) -> PriceQuote {
    quote(entries.iter().map(FileEntry::print_spec))
}

pub(crate) fn printed_pages(entry: &FileEntry) -> u64 {
    printed_pages_for(&entry.print_spec())
}

impl FileEntry {
    pub fn print_spec(&self) -> PrintSpec {
        PrintSpec {
            page_count: i64::from(self.page_count),
            from: self.from.map(i64::from),
            to: self.to.map(i64::from),
            color: self.color,
            copies: i64::from(self.copies),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(page_count: i64, from: Option<i64>, to: Option<i64>, copies: i64) -> PrintSpec {
        PrintSpec {
            page_count,
            from,
            to,
            color: ColorMode::Bw,
            copies,
        }
    }

    #[test]
    fn test_no_range_prints_whole_document_per_copy() {
        for pages in [1, 7, 120] {
            for copies in [1, 2, 5] {
                let s = spec(pages, None, None, copies);
                assert_eq!(printed_pages_for(&s), (pages * copies) as u64);
            }
        }
    }

    #[test]
    fn test_valid_range_prints_only_range() {
        let s = spec(10, Some(2), Some(5), 3);
        assert_eq!(effective_pages(&s), 4);
        assert_eq!(printed_pages_for(&s), 12);

        let whole = spec(10, Some(1), Some(10), 1);
        assert_eq!(printed_pages_for(&whole), 10);
    }

    #[test]
    fn test_reversed_range_falls_back_to_full_document() {
        let s = spec(9, Some(6), Some(3), 1);
        assert_eq!(printed_pages_for(&s), 9);
    }

    #[test]
    fn test_half_open_range_is_ignored() {
        assert_eq!(effective_pages(&spec(8, Some(3), None, 1)), 8);
        assert_eq!(effective_pages(&spec(8, None, Some(3), 1)), 8);
    }

    #[test]
    fn test_range_is_clamped_to_page_count() {
        assert_eq!(effective_pages(&spec(5, Some(3), Some(40), 1)), 3);
        // Both ends past the end clamp onto the last page.
        assert_eq!(effective_pages(&spec(5, Some(7), Some(9), 1)), 1);
    }

    #[test]
    fn test_zero_bound_is_unset() {
        assert_eq!(effective_pages(&spec(6, Some(0), Some(2), 1)), 6);
        assert_eq!(effective_pages(&spec(6, Some(2), Some(0), 1)), 6);
    }

    #[test]
    fn test_negative_from_is_clamped_to_first_page() {
        let s = spec(10, Some(-2), Some(5), 1);
        assert_eq!(clamped_range(&s), Some((1, 5)));
        assert_eq!(printed_pages_for(&s), 5);
        assert_eq!(cost_for(&s), 10);

        // A negative start on a reversed range still prints everything.
        assert_eq!(effective_pages(&spec(10, Some(-2), Some(-5), 1)), 10);
    }

    #[test]
    fn test_missing_page_count_counts_as_one() {
        assert_eq!(printed_pages_for(&spec(0, None, None, 1)), 1);
        assert_eq!(printed_pages_for(&spec(-4, None, None, 2)), 2);
    }

    #[test]
    fn test_non_positive_copies_print_once() {
        assert_eq!(printed_pages_for(&spec(4, None, None, 0)), 4);
        assert_eq!(printed_pages_for(&spec(4, None, None, -2)), 4);
    }

    #[test]
    fn test_price_per_color() {
        assert_eq!(price_per_page(ColorMode::Bw), 2);
        assert_eq!(price_per_page(ColorMode::Color), 3);
    }

    #[test]
    fn test_quote_bw_range_with_copies() {
        let q = quote([spec(10, Some(2), Some(5), 2)]);
        assert_eq!(q.total_pages, 8);
        assert_eq!(q.total_cost, 16);
    }

    #[test]
    fn test_quote_color_without_range() {
        let q = quote([PrintSpec {
            page_count: 3,
            from: None,
            to: None,
            color: ColorMode::Color,
            copies: 1,
        }]);
        assert_eq!(q.total_pages, 3);
        assert_eq!(q.total_cost, 9);
    }

    #[test]
    fn test_quote_mixes_colors() {
        let color = PrintSpec {
            color: ColorMode::Color,
            ..spec(2, None, None, 2)
        };
        let q = quote([spec(5, None, None, 1), color]);
        assert_eq!(q.total_pages, 9);
        assert_eq!(q.total_cost, 5 * 2 + 4 * 3);
    }

    #[test]
    fn test_quote_is_deterministic() {
        let specs = [spec(10, Some(2), Some(5), 2), spec(3, None, None, 1)];
        assert_eq!(quote(specs), quote(specs));
    }

    #[test]
    fn test_empty_quote_is_zero() {
        let q = quote(std::iter::empty());
        assert_eq!(q.total_pages, 0);
        assert_eq!(q.total_cost, 0);
    }
}
