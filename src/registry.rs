// src/registry.rs

//! Authoritative patch set
//!
//! Packages contribute descriptors one merge at a time. When two descriptors
//! name the same logical patch (same target, same id) the one with the greater
//! content hash is authoritative, which makes the outcome independent of merge
//! order. Every contributed copy is kept, so forgetting a package promotes the
//! best copy that remains.

use crate::patch::PatchDescriptor;
use tracing::debug;

#[derive(Debug, Clone)]
struct TargetPatches {
    target: String,
    /// Authoritative descriptor per id, in first-seen order
    patches: Vec<PatchDescriptor>,
    /// Every contributed copy, one per (id, source package, source path)
    candidates: Vec<PatchDescriptor>,
}

impl TargetPatches {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            patches: Vec::new(),
            candidates: Vec::new(),
        }
    }

    /// Best remaining copy of `id`; an equal hash does not displace an earlier copy
    fn best_candidate(&self, id: &str) -> Option<&PatchDescriptor> {
        self.candidates
            .iter()
            .filter(|c| c.id == id)
            .fold(None, |best, c| match best {
                Some(b) if c.hash <= b.hash => Some(b),
                _ => Some(c),
            })
    }

    /// Bring the authoritative entry for `id` in line with the candidates
    ///
    /// Returns whether it changed.
    fn elect(&mut self, id: &str) -> bool {
        let winner = self.best_candidate(id).cloned();
        let position = self.patches.iter().position(|p| p.id == id);

        match (winner, position) {
            (Some(winner), Some(index)) if self.patches[index] == winner => false,
            (Some(winner), Some(index)) => {
                self.patches[index] = winner;
                true
            }
            (Some(winner), None) => {
                self.patches.push(winner);
                true
            }
            (None, Some(index)) => {
                self.patches.remove(index);
                true
            }
            (None, None) => false,
        }
    }
}

/// Patches keyed by target package, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct PatchRegistry {
    targets: Vec<TargetPatches>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge descriptors contributed by `package`
    ///
    /// Returns how many were inserted or replaced an existing entry.
    pub fn merge_from<I>(&mut self, package: &str, descriptors: I) -> usize
    where
        I: IntoIterator<Item = PatchDescriptor>,
    {
        let mut accepted = 0;

        for patch in descriptors {
            let id = patch.id.clone();
            let slot = self.target_entry(&patch.target_package);
            let existing = slot.candidates.iter().position(|c| {
                c.id == patch.id && c.source_package == patch.source_package && c.source == patch.source
            });
            match existing {
                Some(index) => slot.candidates[index] = patch,
                None => slot.candidates.push(patch),
            }
            if slot.elect(&id) {
                accepted += 1;
            }
        }

        if accepted > 0 {
            debug!("Found {} patches in package {}", accepted, package);
        }

        accepted
    }

    /// Drop every copy contributed by `package`
    ///
    /// Patches it shared with other packages fall back to their best remaining copy.
    /// Returns how many copies were dropped.
    pub fn forget_source(&mut self, package: &str) -> usize {
        let mut removed = 0;
        for entry in &mut self.targets {
            let before = entry.candidates.len();
            entry.candidates.retain(|c| c.source_package != package);
            if entry.candidates.len() == before {
                continue;
            }
            removed += before - entry.candidates.len();

            let ids: Vec<String> = entry.patches.iter().map(|p| p.id.clone()).collect();
            for id in &ids {
                entry.elect(id);
            }
        }
        self.targets.retain(|entry| !entry.patches.is_empty());
        removed
    }

    /// Targets with their patches, in insertion order
    pub fn all_targets(&self) -> impl Iterator<Item = (&str, &[PatchDescriptor])> {
        self.targets
            .iter()
            .map(|entry| (entry.target.as_str(), entry.patches.as_slice()))
    }

    pub fn patches_for(&self, target: &str) -> &[PatchDescriptor] {
        self.targets
            .iter()
            .find(|entry| entry.target == target)
            .map(|entry| entry.patches.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, target: &str, id: &str) -> Option<&PatchDescriptor> {
        self.patches_for(target).iter().find(|p| p.id == id)
    }

    pub fn contains(&self, target: &str, id: &str) -> bool {
        self.get(target, id).is_some()
    }

    /// Total number of patches across all targets
    pub fn len(&self) -> usize {
        self.targets.iter().map(|entry| entry.patches.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn target_entry(&mut self, target: &str) -> &mut TargetPatches {
        let index = match self.targets.iter().position(|entry| entry.target == target) {
            Some(index) => index,
            None => {
                self.targets.push(TargetPatches::new(target));
                self.targets.len() - 1
            }
        };
        &mut self.targets[index]
    }
}
