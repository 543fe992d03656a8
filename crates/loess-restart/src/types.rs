//! In-memory restart state.

use loess_core::StepId;

/// Values of one persistent field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRecord {
    /// Field name as registered in the simulation.
    pub name: String,
    /// Field contents in storage order.
    pub values: Vec<f64>,
}

/// Persistent fields captured at the end of a step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RestartState {
    /// The last completed step.
    pub step_id: StepId,
    /// Captured fields, in registration order.
    pub fields: Vec<FieldRecord>,
}

impl RestartState {
    /// Create an empty state at `step_id`.
    pub fn new(step_id: StepId) -> Self {
        Self {
            step_id,
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.fields.push(FieldRecord {
            name: name.into(),
            values,
        });
    }

    /// Values of the named field, if captured.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.fields
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.values.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let mut state = RestartState::new(StepId(3));
        state.push("channel_sed", vec![1.0, 2.0]);
        state.push("soil_storage", vec![0.3, 0.4]);
        assert_eq!(state.get("soil_storage"), Some(&[0.3, 0.4][..]));
        assert_eq!(state.get("missing"), None);
    }
}
