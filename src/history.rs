/// Append-only log of the lines accepted by the shell during this session.
///
/// Entries are numbered from 1 in the order they were added. Numbers never change:
/// nothing is ever removed or renumbered.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `line` and returns its 1-based index.
    pub fn push(&mut self, line: impl Into<String>) -> usize {
        self.entries.push(line.into());
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries with their indices, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, line)| (i + 1, line.as_str()))
    }

    /// The last `n` entries with their absolute indices, oldest first.
    ///
    /// Asking for more entries than exist yields the whole log.
    pub fn last(&self, n: usize) -> impl Iterator<Item = (usize, &str)> {
        self.iter().skip(self.entries.len().saturating_sub(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> History {
        let mut history = History::new();
        for line in ["echo one", "pwd", "type echo"] {
            history.push(line);
        }
        history
    }

    #[test]
    fn test_push_returns_running_index() {
        let mut history = History::new();
        assert!(history.is_empty());
        assert_eq!(history.push("a"), 1);
        assert_eq!(history.push("b"), 2);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_last_keeps_absolute_indices() {
        let history = sample();
        let last: Vec<_> = history.last(2).collect();
        assert_eq!(last, vec![(2, "pwd"), (3, "type echo")]);
    }

    #[test]
    fn test_last_with_large_or_zero_count() {
        let history = sample();
        assert_eq!(history.last(10).count(), 3);
        assert_eq!(history.last(0).count(), 0);
    }
}
