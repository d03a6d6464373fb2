use crate::error::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What to do with a page number that falls outside the document.
///
/// Range bounds are always clamped when selecting a set; this policy decides
/// the fate of single page numbers (and, under `Reject`, of range bounds too).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Drop out-of-range single pages; `"99"` on a 10-page document selects nothing.
    #[default]
    Ignore,
    /// Clamp single pages into `[1, page_count]` exactly like range bounds.
    Clamp,
    /// Fail with [`TaskError::PageOutOfRange`].
    Reject,
}

/// One inclusive 1-based run of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub start: u32,
    pub end: u32,
}

impl PageSpan {
    pub fn new(start: u32, end: u32) -> Self {
        PageSpan { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// 1-based page numbers covered by this span.
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl std::fmt::Display for PageSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Order-preserving selection used for splitting.
pub type PageRangeList = Vec<PageSpan>;

/// Order-independent selection of zero-based page indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageIndexSet(BTreeSet<u32>);

impl PageIndexSet {
    pub fn full(page_count: u32) -> Self {
        PageIndexSet((0..page_count).collect())
    }

    pub fn contains(&self, index: u32) -> bool {
        self.0.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// 1-based page numbers in ascending order, the numbering lopdf uses.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.0.iter().map(|idx| idx + 1).collect()
    }

    fn insert(&mut self, index: u32) {
        self.0.insert(index);
    }
}

impl FromIterator<u32> for PageIndexSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        PageIndexSet(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Single(i64),
    Range(i64, i64),
}

impl Segment {
    /// Parse one comma-separated piece such as "5" or "7-9".
    fn parse(expression: &str, s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TaskError::invalid_expression(expression, "empty segment"));
        }

        match s.split_once('-') {
            Some((start, end)) => Ok(Segment::Range(
                parse_number(expression, start)?,
                parse_number(expression, end)?,
            )),
            None => Ok(Segment::Single(parse_number(expression, s)?)),
        }
    }
}

fn parse_number(expression: &str, s: &str) -> Result<i64> {
    let s = s.trim();
    s.parse::<i64>().map_err(|_| {
        TaskError::invalid_expression(expression, format!("invalid page number '{}'", s))
    })
}

fn is_all(expression: &str) -> bool {
    expression.trim().eq_ignore_ascii_case("all")
}

/// Parse every segment up front so a malformed piece fails the whole expression.
fn parse_segments(expression: &str) -> Result<Vec<Segment>> {
    expression
        .split(',')
        .map(|part| Segment::parse(expression, part))
        .collect()
}

fn clamp_page(page: i64, low: u32, high: u32) -> u32 {
    page.clamp(low as i64, high as i64) as u32
}

/// Turns page range expressions like `"1-3,5,7-9"` into page selections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageSelector {
    policy: OutOfRangePolicy,
}

impl PageSelector {
    pub fn new(policy: OutOfRangePolicy) -> Self {
        PageSelector { policy }
    }

    pub fn policy(&self) -> OutOfRangePolicy {
        self.policy
    }

    /// Parse `expression` into a deduplicated set of zero-based indices.
    ///
    /// Range bounds clamp into the document (`"5-99"` on 10 pages selects
    /// pages 5 through 10); overlapping segments collapse.
    pub fn parse_as_set(&self, expression: &str, page_count: u32) -> Result<PageIndexSet> {
        if page_count == 0 {
            return Err(TaskError::invalid_parameter("page count must be greater than zero"));
        }
        if is_all(expression) {
            return Ok(PageIndexSet::full(page_count));
        }

        let mut set = PageIndexSet::default();
        for segment in parse_segments(expression)? {
            match segment {
                Segment::Range(start, end) => {
                    if self.policy == OutOfRangePolicy::Reject {
                        self.check_in_range(start, page_count)?;
                        self.check_in_range(end, page_count)?;
                    }
                    let start = start.max(1);
                    let end = end.min(page_count as i64);
                    for page in start..=end {
                        set.insert((page - 1) as u32);
                    }
                }
                Segment::Single(page) => {
                    if (1..=page_count as i64).contains(&page) {
                        set.insert((page - 1) as u32);
                        continue;
                    }
                    match self.policy {
                        OutOfRangePolicy::Ignore => {
                            tracing::debug!(page, page_count, "Ignoring out-of-range page");
                        }
                        OutOfRangePolicy::Clamp => {
                            set.insert(clamp_page(page, 1, page_count) - 1);
                        }
                        OutOfRangePolicy::Reject => {
                            return Err(TaskError::PageOutOfRange { page, page_count });
                        }
                    }
                }
            }
        }

        Ok(set)
    }

    /// Parse `expression` into ordered spans, one per segment.
    ///
    /// Every span is clamped into `[1, page_count]` with `start <= end`;
    /// segment order and overlaps are kept as written.
    pub fn parse_as_range_list(&self, expression: &str, page_count: u32) -> Result<PageRangeList> {
        if page_count == 0 {
            return Err(TaskError::invalid_parameter("page count must be greater than zero"));
        }
        if is_all(expression) {
            return Ok(vec![PageSpan::new(1, page_count)]);
        }

        parse_segments(expression)?
            .into_iter()
            .map(|segment| {
                let (start, end) = match segment {
                    Segment::Single(page) => (page, page),
                    Segment::Range(start, end) => (start, end),
                };
                if self.policy == OutOfRangePolicy::Reject {
                    self.check_in_range(start, page_count)?;
                    self.check_in_range(end, page_count)?;
                }
                let start = clamp_page(start, 1, page_count);
                let end = clamp_page(end, start, page_count);
                Ok(PageSpan::new(start, end))
            })
            .collect()
    }

    fn check_in_range(&self, page: i64, page_count: u32) -> Result<()> {
        if (1..=page_count as i64).contains(&page) {
            Ok(())
        } else {
            Err(TaskError::PageOutOfRange { page, page_count })
        }
    }
}

/// Parse with the default [`OutOfRangePolicy::Ignore`] policy.
pub fn parse_as_set(expression: &str, page_count: u32) -> Result<PageIndexSet> {
    PageSelector::default().parse_as_set(expression, page_count)
}

/// Parse with the default [`OutOfRangePolicy::Ignore`] policy.
pub fn parse_as_range_list(expression: &str, page_count: u32) -> Result<PageRangeList> {
    PageSelector::default().parse_as_range_list(expression, page_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn set(indices: &[u32]) -> PageIndexSet {
        indices.iter().copied().collect()
    }

    fn spans(pairs: &[(u32, u32)]) -> PageRangeList {
        pairs.iter().map(|&(s, e)| PageSpan::new(s, e)).collect()
    }

    #[test]
    fn test_all_sentinel() {
        assert_eq!(parse_as_set("all", 4).unwrap(), set(&[0, 1, 2, 3]));
        assert_eq!(parse_as_set("  ALL ", 2).unwrap(), set(&[0, 1]));
        assert_eq!(parse_as_range_list("All", 7).unwrap(), spans(&[(1, 7)]));
    }

    #[test]
    fn test_mixed_singles_and_ranges() {
        assert_eq!(parse_as_set("1,3,5-7", 10).unwrap(), set(&[0, 2, 4, 5, 6]));
    }

    #[test]
    fn test_range_end_is_clamped() {
        assert_eq!(parse_as_set("5-99", 10).unwrap(), set(&[4, 5, 6, 7, 8, 9]));
    }

    #[test]
    fn test_range_start_is_clamped() {
        assert_eq!(parse_as_set("0-2", 10).unwrap(), set(&[0, 1]));
    }

    #[test]
    fn test_inverted_range_selects_nothing() {
        assert!(parse_as_set("8-3", 10).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_single_is_ignored_by_default() {
        assert!(parse_as_set("99", 10).unwrap().is_empty());
        assert_eq!(parse_as_set("0,2", 10).unwrap(), set(&[1]));
    }

    #[test]
    fn test_out_of_range_single_clamps_under_clamp_policy() {
        let selector = PageSelector::new(OutOfRangePolicy::Clamp);
        assert_eq!(selector.parse_as_set("99", 10).unwrap(), set(&[9]));
        assert_eq!(selector.parse_as_set("0", 10).unwrap(), set(&[0]));
    }

    #[test]
    fn test_out_of_range_rejected_under_reject_policy() {
        let selector = PageSelector::new(OutOfRangePolicy::Reject);
        let err = selector.parse_as_set("99", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PageOutOfRange);

        let err = selector.parse_as_set("5-99", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PageOutOfRange);

        let err = selector.parse_as_range_list("11", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PageOutOfRange);

        assert_eq!(selector.parse_as_set("1-10", 10).unwrap().len(), 10);
    }

    #[test]
    fn test_duplicates_collapse_in_set() {
        assert_eq!(parse_as_set("1-3,2,3-4", 10).unwrap(), set(&[0, 1, 2, 3]));
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        assert_eq!(parse_as_set(" 1 , 3 - 4 ", 10).unwrap(), set(&[0, 2, 3]));
    }

    #[test]
    fn test_range_list_preserves_order() {
        assert_eq!(
            parse_as_range_list("1-3,5-7,10", 10).unwrap(),
            spans(&[(1, 3), (5, 7), (10, 10)])
        );
        assert_eq!(
            parse_as_range_list("9-10,1-2,1-2", 10).unwrap(),
            spans(&[(9, 10), (1, 2), (1, 2)])
        );
    }

    #[test]
    fn test_range_list_clamps() {
        assert_eq!(
            parse_as_range_list("0-3,8-99,42", 10).unwrap(),
            spans(&[(1, 3), (8, 10), (10, 10)])
        );
        // end can never precede start
        assert_eq!(parse_as_range_list("8-3", 10).unwrap(), spans(&[(8, 8)]));
    }

    #[test]
    fn test_malformed_expression_fails_both_modes() {
        for expr in ["abc-2", "abc", "1,,2", "", "1-", "-5", "1-x", "3,"] {
            let err = parse_as_set(expr, 10).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidExpression, "set: {:?}", expr);
            let err = parse_as_range_list(expr, 10).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidExpression, "list: {:?}", expr);
        }
    }

    #[test]
    fn test_zero_page_count_is_rejected() {
        let err = parse_as_set("all", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        let err = parse_as_range_list("1", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_span_helpers() {
        let span = PageSpan::new(3, 5);
        assert_eq!(span.len(), 3);
        assert_eq!(span.pages().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(span.to_string(), "3-5");
    }

    #[test]
    fn test_page_numbers_are_one_based() {
        let selected = parse_as_set("4,2", 5).unwrap();
        assert_eq!(selected.page_numbers(), vec![2, 4]);
    }

    fn expression_strategy() -> impl Strategy<Value = String> {
        let segment = prop_oneof![
            (0i64..40).prop_map(|n| n.to_string()),
            (0i64..40, 0i64..40).prop_map(|(a, b)| format!("{}-{}", a, b)),
        ];
        prop::collection::vec(segment, 1..6).prop_map(|parts| parts.join(","))
    }

    proptest! {
        #[test]
        fn prop_full_selection_for_all(n in 1u32..500) {
            let selected = parse_as_set("all", n).unwrap();
            prop_assert_eq!(selected.len(), n as usize);
            prop_assert_eq!(selected.iter().next(), Some(0));
            prop_assert_eq!(selected.iter().last(), Some(n - 1));
        }

        #[test]
        fn prop_set_indices_in_bounds(expr in expression_strategy(), n in 1u32..30) {
            for policy in [OutOfRangePolicy::Ignore, OutOfRangePolicy::Clamp] {
                let selected = PageSelector::new(policy).parse_as_set(&expr, n).unwrap();
                prop_assert!(selected.iter().all(|idx| idx < n));
            }
        }

        #[test]
        fn prop_range_list_spans_in_bounds(expr in expression_strategy(), n in 1u32..30) {
            let list = parse_as_range_list(&expr, n).unwrap();
            prop_assert_eq!(list.len(), expr.split(',').count());
            for span in list {
                prop_assert!(1 <= span.start && span.start <= span.end && span.end <= n);
            }
        }

        #[test]
        fn prop_parsing_is_idempotent(expr in expression_strategy(), n in 1u32..30) {
            prop_assert_eq!(parse_as_set(&expr, n).unwrap(), parse_as_set(&expr, n).unwrap());
            prop_assert_eq!(
                parse_as_range_list(&expr, n).unwrap(),
                parse_as_range_list(&expr, n).unwrap()
            );
        }
    }
}
