//! Field definitions, layouts, and the [`FieldSet`] bitset.

use crate::domain::Domain;
use crate::id::FieldId;
use crate::landcover::N_LANDCOVER;

/// Shape of a field over the [`Domain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// One value per active cell.
    Scalar,
    /// One value per landcover fraction per active cell, cell-major:
    /// `data[cell * N_LANDCOVER + fraction]`.
    Fractional,
    /// One value per routing sub-step per active cell, sub-step-major:
    /// `data[substep * cell_count + cell]`.
    Substep,
    /// One value per waterbody-bearing cell.
    Waterbody,
}

impl FieldType {
    /// Number of stored values for this field type over `domain`.
    pub fn len(&self, domain: &Domain) -> usize {
        match self {
            Self::Scalar => domain.cell_count(),
            Self::Fractional => domain.cell_count() * N_LANDCOVER,
            Self::Substep => domain.cell_count() * domain.substeps() as usize,
            Self::Waterbody => domain.waterbody_count(),
        }
    }
}

/// Lifetime of a field's contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldMutability {
    /// Set once at initialization, read-only thereafter.
    Static,
    /// Carried across steps and saved in restart states.
    Persistent,
    /// Recomputed every step; never saved.
    Transient,
}

/// Value a field takes before its first write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InitialValue {
    /// All zeros.
    Zero,
    /// Every element set to the given constant.
    Constant(f64),
    /// Must be supplied by the configuration; its absence is fatal.
    Required,
}

/// Definition of a field registered in a simulation.
///
/// `FieldId(n)` is the index of the definition in the registered list.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// Name used in logs and restart states. Must be unique.
    pub name: String,
    /// Layout over the domain.
    pub field_type: FieldType,
    /// Allocation lifetime.
    pub mutability: FieldMutability,
    /// Optional unit annotation (e.g., `"m3/s"`).
    pub units: Option<String>,
    /// Value before the first write.
    pub initial: InitialValue,
}

impl FieldDef {
    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns a description if the name is empty, a constant initial
    /// value is not finite, or a transient field is marked required.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("field name must not be empty".to_string());
        }
        if let InitialValue::Constant(v) = self.initial {
            if !v.is_finite() {
                return Err(format!(
                    "field '{}' has non-finite initial value {v}",
                    self.name
                ));
            }
        }
        if self.mutability == FieldMutability::Transient && self.initial == InitialValue::Required
        {
            return Err(format!(
                "transient field '{}' cannot require a configured value",
                self.name
            ));
        }
        Ok(())
    }
}

/// A set of field IDs implemented as a dynamically-sized bitset.
///
/// Used by propagators to declare which fields they read and write so
/// the pipeline can be validated before the first step.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    bits: Vec<u64>,
}

impl FieldSet {
    const BITS_PER_WORD: usize = 64;

    /// Create an empty field set.
    pub fn empty() -> Self {
        Self { bits: Vec::new() }
    }

    /// Insert a field ID into the set.
    pub fn insert(&mut self, field: FieldId) {
        let word = field.0 as usize / Self::BITS_PER_WORD;
        let bit = field.0 as usize % Self::BITS_PER_WORD;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1u64 << bit;
    }

    /// Check whether the set contains a field ID.
    pub fn contains(&self, field: FieldId) -> bool {
        let word = field.0 as usize / Self::BITS_PER_WORD;
        let bit = field.0 as usize % Self::BITS_PER_WORD;
        word < self.bits.len() && (self.bits[word] & (1u64 << bit)) != 0
    }

    /// Return the union of two sets.
    pub fn union(&self, other: &Self) -> Self {
        let len = self.bits.len().max(other.bits.len());
        let bits = (0..len)
            .map(|i| {
                self.bits.get(i).copied().unwrap_or(0) | other.bits.get(i).copied().unwrap_or(0)
            })
            .collect();
        Self { bits }
    }

    /// Returns `true` if the set contains no fields.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Returns the number of fields in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the field IDs in the set, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.bits.iter().enumerate().flat_map(|(word_idx, &word)| {
            (0..Self::BITS_PER_WORD)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| FieldId((word_idx * Self::BITS_PER_WORD + bit) as u32))
        })
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        let len = self.bits.len().max(other.bits.len());
        (0..len).all(|i| {
            self.bits.get(i).copied().unwrap_or(0) == other.bits.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for FieldSet {}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn def(initial: InitialValue, mutability: FieldMutability) -> FieldDef {
        FieldDef {
            name: "channel_sed".to_string(),
            field_type: FieldType::Scalar,
            mutability,
            units: Some("kg".to_string()),
            initial,
        }
    }

    #[test]
    fn layout_lengths_follow_domain() {
        let d = Domain::new(10)
            .with_waterbodies(vec![2, 4])
            .unwrap()
            .with_substeps(3)
            .unwrap();
        assert_eq!(FieldType::Scalar.len(&d), 10);
        assert_eq!(FieldType::Fractional.len(&d), 10 * N_LANDCOVER);
        assert_eq!(FieldType::Substep.len(&d), 30);
        assert_eq!(FieldType::Waterbody.len(&d), 2);
    }

    #[test]
    fn validate_rejects_bad_definitions() {
        assert!(def(InitialValue::Zero, FieldMutability::Persistent).validate().is_ok());
        assert!(def(InitialValue::Constant(f64::NAN), FieldMutability::Static)
            .validate()
            .is_err());
        assert!(def(InitialValue::Required, FieldMutability::Transient)
            .validate()
            .is_err());
        let mut unnamed = def(InitialValue::Zero, FieldMutability::Static);
        unnamed.name.clear();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn set_iterates_in_order() {
        let set: FieldSet = [FieldId(70), FieldId(3), FieldId(64)].into_iter().collect();
        let ids: Vec<FieldId> = set.iter().collect();
        assert_eq!(ids, vec![FieldId(3), FieldId(64), FieldId(70)]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn equality_ignores_trailing_words() {
        let mut a = FieldSet::empty();
        a.insert(FieldId(100));
        let b: FieldSet = [FieldId(1)].into_iter().collect();
        let a_small: FieldSet = [FieldId(1)].into_iter().collect();
        assert_ne!(a, b);
        assert_eq!(b, a_small.union(&FieldSet::empty()));
    }

    proptest! {
        #[test]
        fn union_contains_both(xs in proptest::collection::vec(0u32..200, 0..20),
                               ys in proptest::collection::vec(0u32..200, 0..20)) {
            let a: FieldSet = xs.iter().map(|&x| FieldId(x)).collect();
            let b: FieldSet = ys.iter().map(|&y| FieldId(y)).collect();
            let u = a.union(&b);
            for x in xs.iter().chain(&ys) {
                prop_assert!(u.contains(FieldId(*x)));
            }
        }
    }
}
