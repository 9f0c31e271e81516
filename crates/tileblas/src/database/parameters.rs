use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Resolved set of named integer tuning knobs (tile sizes, work per thread,
/// vector widths).
///
/// Names are kept in canonical order, sorted by name, whatever order they
/// were listed in. Iteration, the generated defines (and with them the
/// program cache key) and tuning file export all follow that order, so two
/// sets with the same pairs compare and export identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuningParameters {
    values: BTreeMap<String, usize>,
}

impl TuningParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.values.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: usize) -> Option<usize> {
        self.values.insert(name.into(), value)
    }

    /// Add every parameter of `other`, overwriting on name collisions.
    pub fn extend(&mut self, other: &TuningParameters) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The parameters as compile-time constants, one `#define` per line.
    pub fn to_defines(&self) -> String {
        let mut defines = String::new();
        for (name, value) in &self.values {
            let _ = writeln!(defines, "#define {} {}", name, value);
        }
        defines
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for TuningParameters {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}
