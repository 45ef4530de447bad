//! Owned terminal registry, addressed by stable identifiers.

use crate::ue::Ue;
use slicesim_types::UeId;

/// All terminals of a run, owned by the cell. Indexed directly by [`UeId`];
/// identifiers are dense and assigned at provisioning time.
#[derive(Debug, Clone, Default)]
pub struct UeRegistry {
    ues: Vec<Ue>,
}

impl UeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next identifier.
    pub fn next_id(&self) -> UeId {
        UeId(self.ues.len() as u32)
    }

    pub fn insert(&mut self, ue: Ue) -> UeId {
        let id = ue.id;
        debug_assert_eq!(id.0 as usize, self.ues.len());
        self.ues.push(ue);
        id
    }

    pub fn get(&self, id: UeId) -> &Ue {
        &self.ues[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: UeId) -> &mut Ue {
        &mut self.ues[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.ues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ues.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = UeId> + '_ {
        self.ues.iter().map(|u| u.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ue> {
        self.ues.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ue> {
        self.ues.iter_mut()
    }
}
