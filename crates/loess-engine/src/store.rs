//! The grid state store.
//!
//! [`GridStore`] owns every field array. Propagators never touch it
//! directly: each one reads through the store (as a [`FieldReader`]) and
//! writes into [`StagedWrites`], which are checked for non-finite values
//! and then committed. A [`StoreSnapshot`] taken at step start serves both
//! as the previous-step view and as the rollback point.

use indexmap::IndexMap;
use loess_core::{
    Domain, FieldDef, FieldId, FieldMutability, FieldReader, FieldWriter, InitialValue,
    PropagatorError, StepId,
};
use loess_propagator::WriteMode;

fn initial_values(def: &FieldDef, domain: &Domain) -> Vec<f64> {
    let len = def.field_type.len(domain);
    match def.initial {
        InitialValue::Constant(v) => vec![v; len],
        InitialValue::Zero | InitialValue::Required => vec![0.0; len],
    }
}

/// Owner of all grid fields of a simulation.
#[derive(Clone, Debug)]
pub struct GridStore {
    defs: Vec<FieldDef>,
    data: Vec<Vec<f64>>,
}

impl GridStore {
    /// Allocate every field at its initial value.
    ///
    /// Required fields start at zero until the configuration fills them.
    pub fn new(defs: Vec<FieldDef>, domain: &Domain) -> Self {
        let data = defs.iter().map(|d| initial_values(d, domain)).collect();
        Self { defs, data }
    }

    /// Registered field definitions, indexed by `FieldId`.
    pub fn defs(&self) -> &[FieldDef] {
        &self.defs
    }

    /// Definition of `field`.
    pub fn def(&self, field: FieldId) -> Option<&FieldDef> {
        self.defs.get(field.0 as usize)
    }

    /// Look up a field by name.
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.defs
            .iter()
            .position(|d| d.name == name)
            .map(|i| FieldId(i as u32))
    }

    /// Current contents of `field`.
    pub fn get(&self, field: FieldId) -> Option<&[f64]> {
        self.data.get(field.0 as usize).map(Vec::as_slice)
    }

    /// Mutable contents of `field`.
    pub fn get_mut(&mut self, field: FieldId) -> Option<&mut [f64]> {
        self.data.get_mut(field.0 as usize).map(Vec::as_mut_slice)
    }

    /// Copy of `field`, or an empty vector if it does not exist.
    pub(crate) fn column(&self, field: FieldId) -> Vec<f64> {
        self.get(field).map(<[f64]>::to_vec).unwrap_or_default()
    }

    /// Overwrite `field` if `values` has the field's length.
    pub(crate) fn set(&mut self, field: FieldId, values: &[f64]) -> bool {
        match self.data.get_mut(field.0 as usize) {
            Some(slot) if slot.len() == values.len() => {
                slot.copy_from_slice(values);
                true
            }
            _ => false,
        }
    }

    /// Reset every transient field to its initial value.
    pub(crate) fn reset_transient(&mut self, domain: &Domain) {
        for (def, slot) in self.defs.iter().zip(self.data.iter_mut()) {
            if def.mutability == FieldMutability::Transient {
                *slot = initial_values(def, domain);
            }
        }
    }

    /// Names and contents of the persistent fields, in registration order.
    pub fn persistent(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.defs
            .iter()
            .zip(&self.data)
            .filter(|(d, _)| d.mutability == FieldMutability::Persistent)
            .map(|(d, v)| (d.name.as_str(), v.as_slice()))
    }

    /// Owned copy of the whole store, tagged with `step_id`.
    pub fn snapshot(&self, step_id: StepId) -> StoreSnapshot {
        StoreSnapshot {
            step_id,
            data: self.data.clone(),
        }
    }

    /// Restore the contents captured in `snapshot`.
    pub(crate) fn restore(&mut self, snapshot: StoreSnapshot) {
        self.data = snapshot.data;
    }

    /// Output buffers for one propagator.
    ///
    /// Full buffers start zeroed; incremental buffers start as a copy of
    /// the current contents.
    pub(crate) fn stage(&self, modes: &IndexMap<FieldId, WriteMode>) -> StagedWrites {
        let buffers = modes
            .iter()
            .filter_map(|(&field, &mode)| {
                let current = self.get(field)?;
                let buffer = match mode {
                    WriteMode::Full => vec![0.0; current.len()],
                    WriteMode::Incremental => current.to_vec(),
                };
                Some((field, buffer))
            })
            .collect();
        StagedWrites { buffers }
    }

    /// Move staged buffers into the store.
    ///
    /// # Errors
    ///
    /// Returns [`PropagatorError::NonFinite`] for the first NaN or
    /// infinity found; nothing is committed in that case.
    pub(crate) fn commit(&mut self, staged: StagedWrites) -> Result<(), PropagatorError> {
        for (&field, buffer) in &staged.buffers {
            if let Some(index) = buffer.iter().position(|v| !v.is_finite()) {
                return Err(PropagatorError::NonFinite {
                    field_id: field,
                    index: Some(index),
                });
            }
        }
        for (field, buffer) in staged.buffers {
            if let Some(slot) = self.data.get_mut(field.0 as usize) {
                *slot = buffer;
            }
        }
        Ok(())
    }
}

impl FieldReader for GridStore {
    fn read(&self, field: FieldId) -> Option<&[f64]> {
        self.get(field)
    }
}

/// Write buffers of one propagator, pending commit.
#[derive(Debug, Default)]
pub(crate) struct StagedWrites {
    buffers: IndexMap<FieldId, Vec<f64>>,
}

impl FieldWriter for StagedWrites {
    fn write(&mut self, field: FieldId) -> Option<&mut [f64]> {
        self.buffers.get_mut(&field).map(Vec::as_mut_slice)
    }
}

/// Frozen copy of the store at a step boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreSnapshot {
    step_id: StepId,
    data: Vec<Vec<f64>>,
}

impl FieldReader for StoreSnapshot {
    fn read(&self, field: FieldId) -> Option<&[f64]> {
        self.data.get(field.0 as usize).map(Vec::as_slice)
    }
}

impl StoreSnapshot {
    /// The step at which this snapshot was taken.
    pub fn step_id(&self) -> StepId {
        self.step_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loess_core::FieldType;

    fn defs() -> Vec<FieldDef> {
        vec![
            FieldDef {
                name: "cell_area".to_string(),
                field_type: FieldType::Scalar,
                mutability: FieldMutability::Static,
                units: Some("m2".to_string()),
                initial: InitialValue::Required,
            },
            FieldDef {
                name: "channel_sed".to_string(),
                field_type: FieldType::Scalar,
                mutability: FieldMutability::Persistent,
                units: Some("kg".to_string()),
                initial: InitialValue::Zero,
            },
            FieldDef {
                name: "runoff_rate".to_string(),
                field_type: FieldType::Fractional,
                mutability: FieldMutability::Transient,
                units: Some("m3/s".to_string()),
                initial: InitialValue::Constant(2.0),
            },
        ]
    }

    #[test]
    fn fields_are_laid_out_over_the_domain() {
        let store = GridStore::new(defs(), &Domain::new(3));
        assert_eq!(store.get(FieldId(0)).unwrap(), &[0.0; 3]);
        assert_eq!(store.get(FieldId(2)).unwrap().len(), 12);
        assert_eq!(store.field_id("channel_sed"), Some(FieldId(1)));
        assert_eq!(store.field_id("nope"), None);
    }

    #[test]
    fn staging_respects_write_mode() {
        let mut store = GridStore::new(defs(), &Domain::new(2));
        assert!(store.set(FieldId(1), &[5.0, 6.0]));
        let modes: IndexMap<FieldId, WriteMode> = [
            (FieldId(1), WriteMode::Incremental),
            (FieldId(0), WriteMode::Full),
        ]
        .into_iter()
        .collect();
        let mut staged = store.stage(&modes);
        assert_eq!(staged.write(FieldId(1)).unwrap(), &[5.0, 6.0]);
        assert_eq!(staged.write(FieldId(0)).unwrap(), &[0.0, 0.0]);
        assert!(staged.write(FieldId(2)).is_none());
        staged.write(FieldId(1)).unwrap()[0] = 7.0;
        store.commit(staged).unwrap();
        assert_eq!(store.get(FieldId(1)).unwrap(), &[7.0, 6.0]);
    }

    #[test]
    fn non_finite_commit_is_rejected_whole() {
        let mut store = GridStore::new(defs(), &Domain::new(2));
        let modes: IndexMap<FieldId, WriteMode> = [
            (FieldId(0), WriteMode::Full),
            (FieldId(1), WriteMode::Full),
        ]
        .into_iter()
        .collect();
        let mut staged = store.stage(&modes);
        staged.write(FieldId(0)).unwrap()[0] = 1.0;
        staged.write(FieldId(1)).unwrap()[1] = f64::NAN;
        let err = store.commit(staged).unwrap_err();
        assert_eq!(
            err,
            PropagatorError::NonFinite {
                field_id: FieldId(1),
                index: Some(1)
            }
        );
        assert_eq!(store.get(FieldId(0)).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn transient_reset_and_restore() {
        let domain = Domain::new(1);
        let mut store = GridStore::new(defs(), &domain);
        let snapshot = store.snapshot(StepId(4));
        store.get_mut(FieldId(2)).unwrap()[0] = 9.0;
        store.get_mut(FieldId(1)).unwrap()[0] = 3.0;
        store.reset_transient(&domain);
        assert_eq!(store.get(FieldId(2)).unwrap()[0], 2.0);
        assert_eq!(store.get(FieldId(1)).unwrap()[0], 3.0);
        store.restore(snapshot.clone());
        assert_eq!(store.get(FieldId(1)).unwrap()[0], 0.0);
        assert_eq!(snapshot.step_id(), StepId(4));
    }

    #[test]
    fn persistent_iterates_only_persistent() {
        let store = GridStore::new(defs(), &Domain::new(2));
        let names: Vec<&str> = store.persistent().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["channel_sed"]);
    }
}
