// allow_list.rs — The generator allow-list.
//
// Only generators named here are ever staged or run. The stock list is the
// set of variant generators shipped with the bike-shelter price sheet; a
// deployment can replace it wholesale in config.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use vf_workspace::layout::is_single_component;

use crate::error::GeneratorError;

/// One allow-listed generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    /// File name of the generator, both in the scripts directory and once
    /// staged into a workspace.
    pub name: String,

    /// Program used to run the script (e.g. `python3`). When absent the
    /// staged file is executed directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
}

impl GeneratorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interpreter: None,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }
}

const STOCK_GENERATORS: &[&str] = &[
    "generate_bosquet_ouvert.py",
    "generate_bosquet_ferme.py",
    "generate_bosquet_ouvert_compact.py",
    "generate_bosquet_ferme_compact.py",
    "generate_domino_ouvert.py",
    "generate_domino_ferme.py",
    "generate_domino_ouvert_compact.py",
    "generate_domino_ferme_compact.py",
    "generate_metallique_ouvert.py",
    "generate_metallique_ferme.py",
    "generate_metallique_ouvert_compact.py",
    "generate_metallique_ferme_compact.py",
    "generate_neve_ouvert.py",
    "generate_neve_ferme.py",
    "generate_neve_ferme_compact.py",
];

/// The stock allow-list: fifteen Python generators run with `python3`.
pub fn stock_generators() -> Vec<GeneratorSpec> {
    STOCK_GENERATORS
        .iter()
        .map(|name| GeneratorSpec::new(*name).with_interpreter("python3"))
        .collect()
}

/// Check that an allow-list is non-empty, uses plain file names, and
/// lists each generator once.
pub fn validate_allow_list(specs: &[GeneratorSpec]) -> Result<(), GeneratorError> {
    if specs.is_empty() {
        return Err(GeneratorError::EmptyAllowList);
    }

    let mut seen = HashSet::new();
    for spec in specs {
        if !is_single_component(&spec.name) {
            return Err(GeneratorError::InvalidName(spec.name.clone()));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(GeneratorError::Duplicate(spec.name.clone()));
        }
        if spec.interpreter.as_deref().is_some_and(|i| i.trim().is_empty()) {
            return Err(GeneratorError::EmptyInterpreter(spec.name.clone()));
        }
    }
    Ok(())
}
