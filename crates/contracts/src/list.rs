use serde::{Deserialize, Serialize};

use crate::Contract;

/// Requested list window. `start` and `max` are echoed back verbatim; the
/// clamped values are only used for slicing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub start: i32,
    pub max: i32,
}

impl Page {
    pub fn new(start: Option<i64>, max: Option<i64>) -> Self {
        Self {
            start: clamp_i32(start.unwrap_or(0)),
            max: clamp_i32(max.unwrap_or(0)),
        }
    }

    /// Returns the total record count and the records inside the window.
    /// `max <= 0` means unbounded.
    pub fn apply<T>(self, records: Vec<T>) -> (i32, Vec<T>) {
        let total = clamp_i32(records.len() as i64);
        let skip = self.start.max(0) as usize;

        let window = records.into_iter().skip(skip);
        let items = if self.max > 0 {
            window.take(self.max as usize).collect()
        } else {
            window.collect()
        };

        (total, items)
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenericListResult<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub total: i32,
    pub max: i32,
    pub start: i32,
}

impl<T> GenericListResult<T> {
    /// Pages `records` first and maps only the surviving window, so `Total`
    /// reflects every qualifying record.
    pub fn from_records<E>(page: Page, records: Vec<E>, map: impl FnMut(E) -> T) -> Self {
        let (total, window) = page.apply(records);
        Self {
            items: window.into_iter().map(map).collect(),
            total,
            max: page.max,
            start: page.start,
        }
    }

    /// Like [`from_records`](Self::from_records) for mappers that can fail.
    pub fn try_from_records<E, Err>(
        page: Page,
        records: Vec<E>,
        map: impl FnMut(E) -> Result<T, Err>,
    ) -> Result<Self, Err> {
        let (total, window) = page.apply(records);
        Ok(Self {
            items: window.into_iter().map(map).collect::<Result<_, _>>()?,
            total,
            max: page.max,
            start: page.start,
        })
    }
}

impl<T: Serialize> Contract for GenericListResult<T> {
    const ROOT: &'static str = "GenericListResult";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_selects_offsets_and_keeps_total() {
        let records = (0..10).collect::<Vec<_>>();
        let out = GenericListResult::from_records(Page::new(Some(3), Some(4)), records, |r| r);

        assert_eq!(out.items, vec![3, 4, 5, 6]);
        assert_eq!(out.total, 10);
        assert_eq!(out.start, 3);
        assert_eq!(out.max, 4);
    }

    #[test]
    fn non_positive_max_is_unbounded() {
        let records = (0..10).collect::<Vec<_>>();
        let (total, items) = Page::new(Some(7), Some(0)).apply(records.clone());
        assert_eq!(total, 10);
        assert_eq!(items, vec![7, 8, 9]);

        let (_, items) = Page::new(None, Some(-5)).apply(records);
        assert_eq!(items.len(), 10);
    }

    #[test]
    fn negative_start_reads_from_the_beginning_but_is_echoed() {
        let out = GenericListResult::from_records(Page::new(Some(-2), Some(2)), vec!['a', 'b', 'c'], |c| c);
        assert_eq!(out.items, vec!['a', 'b']);
        assert_eq!(out.start, -2);
    }

    #[test]
    fn fallible_mapping_stops_at_first_error() {
        let ok = GenericListResult::try_from_records(Page::new(Some(1), None), vec![1, 2, 3], |v| {
            Ok::<_, String>(v * 10)
        })
        .unwrap();
        assert_eq!(ok.items, vec![20, 30]);
        assert_eq!(ok.total, 3);

        let err = GenericListResult::<i32>::try_from_records(Page::default(), vec![1, 2], |v| {
            if v == 2 { Err("boom") } else { Ok(v) }
        })
        .unwrap_err();
        assert_eq!(err, "boom");
    }

    #[test]
    fn start_past_end_yields_empty_items() {
        let out = GenericListResult::from_records(Page::new(Some(20), Some(5)), vec![1, 2, 3], |v| v);
        assert!(out.items.is_empty());
        assert_eq!(out.total, 3);
    }
}
