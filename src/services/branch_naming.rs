//! Fix branch naming.

/// Upper-case, replace every run of non-alphanumerics with one underscore,
/// trim underscores at both ends.
fn normalize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for ch in part.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// `{TEAM}_{LEADER}_AI_Fix`
pub fn format_branch_name(team: &str, leader: &str) -> String {
    format!("{}_{}_AI_Fix", normalize(team), normalize(leader))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_example() {
        assert_eq!(format_branch_name("Team 1!", "jane doe"), "TEAM_1_JANE_DOE_AI_Fix");
    }

    #[test]
    fn test_runs_collapse_and_edges_trim() {
        assert_eq!(format_branch_name("  --rocket   squad-- ", "o'neil"), "ROCKET_SQUAD_O_NEIL_AI_Fix");
    }

    #[test]
    fn test_non_ascii_is_treated_as_separator() {
        assert_eq!(format_branch_name("équipe", "zoë"), "QUIPE_ZO_AI_Fix");
    }
}
