//! Named, ordered collections of per-group clonotype counts.

use repdiv_core::{RepdivError, Result, Summarizable};

/// Ordered mapping from group name to its clonotype count vector.
///
/// Categories are local to each group; nothing is assumed about category
/// identity across groups. Insertion order defines row and column order
/// of the p-value matrices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupCollection {
    names: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl GroupCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from `(name, counts)` pairs.
    ///
    /// ```
    /// use repdiv_stats::groups::GroupCollection;
    ///
    /// let groups = GroupCollection::from_pairs([
    ///     ("naive", vec![5, 3, 1]),
    ///     ("memory", vec![9, 1]),
    /// ])
    /// .unwrap();
    /// assert_eq!(groups.names(), &["naive", "memory"]);
    /// assert_eq!(groups.totals(), vec![9, 10]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error on a duplicate group name.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<usize>)>,
        S: Into<String>,
    {
        let mut groups = Self::new();
        for (name, counts) in pairs {
            groups.push(name, counts)?;
        }
        Ok(groups)
    }

    /// Append a group.
    ///
    /// # Errors
    ///
    /// Returns an error if a group with the same name already exists.
    pub fn push(&mut self, name: impl Into<String>, counts: Vec<usize>) -> Result<()> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(RepdivError::InvalidInput(format!(
                "duplicate group name '{}'",
                name
            )));
        }
        self.names.push(name);
        self.counts.push(counts);
        Ok(())
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the collection has no groups.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Group names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Counts of the group at position `i`.
    pub fn counts(&self, i: usize) -> &[usize] {
        &self.counts[i]
    }

    /// Counts of the group called `name`.
    pub fn get(&self, name: &str) -> Option<&[usize]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.counts[i].as_slice())
    }

    /// `(name, counts)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.names
            .iter()
            .zip(self.counts.iter())
            .map(|(n, c)| (n.as_str(), c.as_slice()))
    }

    /// Total count of each group.
    pub fn totals(&self) -> Vec<usize> {
        self.counts.iter().map(|c| c.iter().sum()).collect()
    }
}

impl Summarizable for GroupCollection {
    fn summary(&self) -> String {
        let totals = self.totals();
        let min = totals.iter().min().copied().unwrap_or(0);
        let max = totals.iter().max().copied().unwrap_or(0);
        format!(
            "GroupCollection: {} groups, totals {}..={}",
            self.len(),
            min,
            max
        )
    }
}
