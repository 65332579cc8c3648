//! Display-side filtering over a feed. Predicates are ANDed; the feed is only
//! ever borrowed.

/// Case-insensitive substring test. An empty needle matches everything.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub struct Projection<'a, T> {
    predicates: Vec<Box<dyn Fn(&T) -> bool + 'a>>,
}

impl<'a, T> Default for Projection<'a, T> {
    fn default() -> Self {
        Self { predicates: Vec::new() }
    }
}

impl<'a, T> Projection<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring match on a display field.
    pub fn search<F>(mut self, query: &'a str, field: F) -> Self
    where
        F: Fn(&T) -> &str + 'a,
    {
        if !query.is_empty() {
            self.predicates.push(Box::new(move |item| contains_ci(field(item), query)));
        }
        self
    }

    /// Equality on a category field; `None` means no constraint.
    pub fn category<C, F>(mut self, wanted: Option<C>, field: F) -> Self
    where
        C: PartialEq + 'a,
        F: Fn(&T) -> C + 'a,
    {
        if let Some(wanted) = wanted {
            self.predicates.push(Box::new(move |item| field(item) == wanted));
        }
        self
    }

    /// Keep only items satisfying `pred` when `enabled` is set.
    pub fn flag<F>(mut self, enabled: bool, pred: F) -> Self
    where
        F: Fn(&T) -> bool + 'a,
    {
        if enabled {
            self.predicates.push(Box::new(pred));
        }
        self
    }

    pub fn matches(&self, item: &T) -> bool {
        self.predicates.iter().all(|p| p(item))
    }

    pub fn apply<'f, I>(&self, items: I) -> Vec<&'f T>
    where
        I: IntoIterator<Item = &'f T>,
        T: 'f,
    {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row {
        label: String,
        kind: u8,
        hot: bool,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { label: "Alpha".into(), kind: 1, hot: true },
            Row { label: "alpine".into(), kind: 2, hot: false },
            Row { label: "Beta".into(), kind: 1, hot: false },
        ]
    }

    #[test]
    fn empty_projection_keeps_everything() {
        let data = rows();
        assert_eq!(Projection::new().apply(&data).len(), 3);
    }

    #[test]
    fn predicates_are_conjunctive() {
        let data = rows();
        let p = Projection::new()
            .search("ALP", |r: &Row| r.label.as_str())
            .category(Some(1u8), |r: &Row| r.kind);
        let out = p.apply(&data);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "Alpha");

        let p = Projection::new()
            .search("alp", |r: &Row| r.label.as_str())
            .flag(true, |r: &Row| r.hot);
        assert_eq!(p.apply(&data).len(), 1);
    }

    #[test]
    fn disabled_flag_is_ignored() {
        let data = rows();
        let p = Projection::new().flag(false, |r: &Row| r.hot);
        assert_eq!(p.apply(&data).len(), 3);
    }

    #[test]
    fn contains_ci_handles_empty_needle() {
        assert!(contains_ci("anything", ""));
        assert!(contains_ci("XyZ789", "yz7"));
        assert!(!contains_ci("ABC123", "zz"));
    }
}
