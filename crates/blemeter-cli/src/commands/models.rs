//! Models command implementation.

use anyhow::Result;

use blemeter_core::{KNOWN_DEVICES, MODEL_ALIASES, MODEL_NAMES};

/// One line per model: name, aliases, and the names it advertises under.
pub fn models_table() -> String {
    let mut out = format!("{:<12} {:<16} {}\n", "MODEL", "ALIASES", "ADVERTISES AS");
    for model in MODEL_NAMES {
        let aliases: Vec<&str> = MODEL_ALIASES
            .iter()
            .filter(|(_, canonical)| canonical == model)
            .map(|(alias, _)| *alias)
            .collect();
        let mut advertised: Vec<String> = KNOWN_DEVICES
            .iter()
            .filter(|known| known.model == *model)
            .map(|known| format!("{} ({}..)", known.name, known.prefix.trim_end_matches(':')))
            .collect();
        advertised.dedup();
        out.push_str(&format!(
            "{:<12} {:<16} {}\n",
            model,
            if aliases.is_empty() { "-".to_string() } else { aliases.join(", ") },
            if advertised.is_empty() { "-".to_string() } else { advertised.join(", ") },
        ));
    }
    out
}

pub fn cmd_models() -> Result<()> {
    print!("{}", models_table());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_table_lists_every_model() {
        let table = models_table();
        assert_eq!(table.lines().count(), MODEL_NAMES.len() + 1);
        for model in MODEL_NAMES {
            assert!(table.contains(model), "missing {}", model);
        }
    }

    #[test]
    fn test_models_table_shows_aliases() {
        let table = models_table();
        let an9002 = table.lines().find(|l| l.starts_with("AN9002")).unwrap();
        assert!(an9002.contains("ZT300AB"));
        assert!(an9002.contains("Bluetooth DMM (FC:58:FA..)"));
        let dummy = table.lines().find(|l| l.starts_with("dummy")).unwrap();
        assert!(dummy.contains('-'));
    }
}
