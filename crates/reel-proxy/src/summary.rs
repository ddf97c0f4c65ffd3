//! End-of-run report of new and unused tapes.

use crate::store::TapeStoreManager;
use crate::tape::Tape;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub name: String,
    /// Storage paths of tapes saved during this run
    pub new_tapes: Vec<String>,
    /// Storage paths of tapes not used since the last reset
    pub unused_tapes: Vec<String>,
}

impl Summary {
    pub fn collect(name: &str, stores: &TapeStoreManager) -> Self {
        let mut summary = Summary {
            name: name.to_string(),
            ..Default::default()
        };
        for tape in stores.all_tapes() {
            if tape.is_new() {
                summary.new_tapes.push(label(&tape));
            }
            if !tape.is_used() {
                summary.unused_tapes.push(label(&tape));
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.new_tapes.is_empty() && self.unused_tapes.is_empty()
    }
}

fn label(tape: &Tape) -> String {
    tape.path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| tape.name().to_string())
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== SUMMARY ({}) =====", self.name)?;
        if !self.new_tapes.is_empty() {
            writeln!(f, "New tapes:")?;
            for path in &self.new_tapes {
                writeln!(f, "- {path}")?;
            }
        }
        if !self.unused_tapes.is_empty() {
            writeln!(f, "Unused tapes:")?;
            for path in &self.unused_tapes {
                writeln!(f, "- {path}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let summary = Summary {
            name: "reel".to_string(),
            new_tapes: vec!["unnamed-1.json".to_string()],
            unused_tapes: vec!["old/a.json".to_string(), "b.json".to_string()],
        };
        assert_eq!(
            summary.to_string(),
            "===== SUMMARY (reel) =====\nNew tapes:\n- unnamed-1.json\nUnused tapes:\n- old/a.json\n- b.json\n"
        );
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let summary = Summary {
            name: "api".to_string(),
            ..Default::default()
        };
        assert!(summary.is_empty());
        assert_eq!(summary.to_string(), "===== SUMMARY (api) =====\n");
    }
}
