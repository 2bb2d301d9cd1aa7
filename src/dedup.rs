use std::collections::HashSet;

/// Links already in the store when the run started. Read-only for the
/// rest of the run and shared by every worker.
#[derive(Debug, Clone, Default)]
pub struct ExistingLinks {
    links: HashSet<String>,
}

impl ExistingLinks {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }
}

impl FromIterator<String> for ExistingLinks {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        ExistingLinks {
            links: iter.into_iter().collect(),
        }
    }
}

/// True when `link` is not in the snapshot.
pub fn is_new(link: &str, existing: &ExistingLinks) -> bool {
    !existing.contains(link)
}
