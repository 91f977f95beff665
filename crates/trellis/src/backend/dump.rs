//! Human- and machine-readable table dumps.

use std::fmt;

/// A whole table, one entry per state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TableDump {
    /// `parser` or `state machine`
    pub kind: String,
    pub states: Vec<StateDump>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StateDump {
    pub id: u32,
    /// State name, for state machines
    #[cfg_attr(feature = "serialize", serde(skip_serializing_if = "Option::is_none", default))]
    pub name: Option<String>,
    /// Kernel items with their lookaheads
    pub items: Vec<String>,
    pub actions: Vec<EntryDump>,
    pub gotos: Vec<EntryDump>,
}

/// `element -> action`, in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryDump {
    pub element: String,
    pub action: String,
}

impl EntryDump {
    #[must_use]
    pub fn new(element: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for TableDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} with {} states", self.kind, self.states.len())?;
        for state in &self.states {
            writeln!(f)?;
            match &state.name {
                Some(name) => writeln!(f, "state {} ({name})", state.id)?,
                None => writeln!(f, "state {}", state.id)?,
            }
            for item in &state.items {
                writeln!(f, "    {item}")?;
            }
            for entry in &state.actions {
                writeln!(f, "  {} -> {}", entry.element, entry.action)?;
            }
            for entry in &state.gotos {
                writeln!(f, "  goto {} -> {}", entry.element, entry.action)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_layout() {
        let dump = TableDump {
            kind: "parser".to_string(),
            states: vec![StateDump {
                id: 0,
                name: None,
                items: vec!["$accept : . S  [$end]".to_string()],
                actions: vec![EntryDump::new("a", "shift 2")],
                gotos: vec![EntryDump::new("S", "1")],
            }],
        };
        assert_eq!(
            dump.to_string(),
            concat!(
                "parser with 1 states\n\n",
                "state 0\n    $accept : . S  [$end]\n  a -> shift 2\n  goto S -> 1\n",
            )
        );
    }
}
