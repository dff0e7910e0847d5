//! Parseurs purs des sorties shell des appareils (aucune I/O).

use crate::models::StorageInfo;

/// Parse `df -h /data`.
/// Colonnes attendues : Filesystem Size Used Avail Use% Mounted-on.
/// Certains toybox coupent la ligne quand le nom du filesystem est long :
/// une ligne à un seul champ est recollée à la suivante.
pub fn storage_report(output: &str) -> StorageInfo {
    let rows: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if rows.len() < 2 {
        return StorageInfo::unknown();
    }

    let mut parts: Vec<&str> = rows[1].split_whitespace().collect();
    if parts.len() == 1 {
        if let Some(next) = rows.get(2) {
            parts.extend(next.split_whitespace());
        }
    }
    if parts.len() < 4 {
        return StorageInfo::unknown();
    }

    StorageInfo {
        total: parts[1].to_string(),
        used: Some(parts[2].to_string()),
        available: parts[3].to_string(),
        use_percentage: parts.get(4).map(|p| p.to_string()),
    }
}

/// Parse `pm list packages` : une ligne `package:<nom>` par paquet, ordre conservé
pub fn package_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("package:"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extrait le nom d'un compte depuis `dumpsys account`
/// (`Account {name=jane@example.com, type=com.google}`).
/// Avec `account_type`, seules les lignes de ce type sont considérées.
pub fn account_name(dump: &str, account_type: Option<&str>) -> Option<String> {
    dump.lines()
        .filter(|line| match account_type {
            Some(kind) => line.contains(&format!("type={kind}")),
            None => true,
        })
        .find_map(|line| {
            let (_, rest) = line.split_once("name=")?;
            let end = rest.find([',', '}']).unwrap_or(rest.len());
            let name = rest[..end].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
}

/// Mappe un état de boot vérifié (`green`, `orange`...) vers « verrouillé ».
/// État vide : valeur par défaut de la marque.
pub fn boot_state_locked(state: &str, locked_states: &[&str], default: bool) -> bool {
    let state = state.trim().to_lowercase();
    if state.is_empty() {
        return default;
    }
    locked_states.contains(&state.as_str())
}
