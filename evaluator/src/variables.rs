//! The variable database built by `extract_variables()` and completed by
//! `compile()`.

use types::{MatrixSize, VariableDescriptor};

use crate::DataAddr;

/// Everything known about one named variable.
#[derive(Debug, Clone)]
pub struct VariableInformation {
    pub name: String,
    /// `None` until declared by the caller or inferred at the WRITE site.
    pub descriptor: Option<VariableDescriptor>,
    /// Offset of the variable's slot in data memory, assigned on first use
    /// during compilation.
    pub location: Option<DataAddr>,
    /// Matrix extents; scalars carry `None`.
    pub dims: Option<MatrixSize>,
    /// Caller-owned backing memory, stored as an address. Set through the
    /// `unsafe` binding API; the evaluator never frees it.
    pub external: Option<usize>,
    /// Payload pool slot for matrix variables.
    pub matrix_index: Option<u16>,
    /// For output entries: a WRITE for this name has been compiled. A READ
    /// resolves to the output entry only once this is set; before that it
    /// falls back to the input table.
    pub written: bool,
}

impl VariableInformation {
    pub fn new(name: &str) -> VariableInformation {
        VariableInformation {
            name: name.to_string(),
            descriptor: None,
            location: None,
            dims: None,
            external: None,
            matrix_index: None,
            written: false,
        }
    }

    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }
}

/// Ordered name-keyed table; order is discovery order, which keeps variable
/// browsing deterministic.
#[derive(Debug, Default, Clone)]
pub struct VariableTable {
    entries: Vec<VariableInformation>,
}

impl VariableTable {
    pub fn new() -> VariableTable {
        VariableTable::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn find(&self, name: &str) -> Option<&VariableInformation> {
        self.entries.iter().find(|v| v.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut VariableInformation> {
        self.entries.iter_mut().find(|v| v.name == name)
    }

    /// Insert a fresh entry; the caller has checked the name is new.
    pub fn add(&mut self, info: VariableInformation) -> &mut VariableInformation {
        self.entries.push(info);
        self.entries.last_mut().unwrap()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableInformation> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut VariableInformation> {
        self.entries.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::TypeDescriptor;

    #[test]
    fn add_and_find() {
        let mut table = VariableTable::new();
        table.add(VariableInformation::new("alpha"));
        let beta = table.add(VariableInformation::new("beta"));
        beta.descriptor = Some(VariableDescriptor::scalar(TypeDescriptor::UInt32));

        assert!(table.contains("alpha"));
        assert_eq!(
            table.find("beta").unwrap().descriptor,
            Some(VariableDescriptor::scalar(TypeDescriptor::UInt32))
        );
        assert!(table.find("gamma").is_none());
    }

    #[test]
    fn iteration_preserves_discovery_order() {
        let mut table = VariableTable::new();
        for name in ["z", "a", "m"] {
            table.add(VariableInformation::new(name));
        }
        let names: Vec<&str> = table.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }
}
