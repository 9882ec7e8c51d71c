//! Collision-avoiding filename generation.
//!
//! Given a submitted filename and the list of names already present in
//! the target directory, produces a name guaranteed not to collide,
//! except in one known-accepted limitation: after `max_attempts` failed
//! attempts, the last candidate tried is returned regardless of whether
//! it still collides.

/// Returns a filename that does not appear in `existing`, derived from
/// `name` by inserting ` (n)` before the extension for `n` in
/// `1..=max_attempts`.
///
/// `existing` is the set of entry names already present in the
/// destination directory. If `name` itself is free, it's returned
/// unchanged. Otherwise `" (1)"`, `" (2)"`, … are tried in order, each
/// time re-splitting at the *last* `.` in the original `name` so the
/// extension survives (e.g. `report.tar.gz` -> `report (1).tar.gz`).
/// If all `max_attempts` candidates collide, the last one is returned
/// anyway; this loop never reports failure back to the caller.
#[must_use]
pub fn gen_unique_filename(name: &str, existing: &[String], max_attempts: u32) -> String {
    if !existing.iter().any(|e| e == name) {
        return name.to_owned();
    }

    let (stem, ext) = match name.rfind('.') {
        // a leading dot (dotfile) has no extension to preserve
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    let mut candidate = name.to_owned();
    for attempt in 1..=max_attempts {
        candidate = format!("{stem} ({attempt}){ext}");
        if attempt == max_attempts || !existing.iter().any(|e| e == &candidate) {
            break;
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_name_unchanged_when_free() {
        let existing = vec!["other.txt".to_owned()];
        assert_eq!(gen_unique_filename("a.txt", &existing, 16), "a.txt");
    }

    #[test]
    fn appends_counter_on_collision() {
        let existing = vec!["a.txt".to_owned()];
        assert_eq!(gen_unique_filename("a.txt", &existing, 16), "a (1).txt");
    }

    #[test]
    fn skips_past_multiple_collisions() {
        let existing = vec!["a.txt".to_owned(), "a (1).txt".to_owned(), "a (2).txt".to_owned()];
        assert_eq!(gen_unique_filename("a.txt", &existing, 16), "a (3).txt");
    }

    #[test]
    fn preserves_extension_after_last_dot() {
        let existing = vec!["report.tar.gz".to_owned()];
        assert_eq!(gen_unique_filename("report.tar.gz", &existing, 16), "report.tar (1).gz");
    }

    #[test]
    fn dotfile_has_no_extension_split() {
        let existing = vec![".gitignore".to_owned()];
        assert_eq!(gen_unique_filename(".gitignore", &existing, 16), ".gitignore (1)");
    }

    #[test]
    fn exhausting_sixteen_attempts_returns_sixteenth_candidate_regardless() {
        let mut existing = vec!["a.txt".to_owned()];
        for n in 1..=16 {
            existing.push(format!("a ({n}).txt"));
        }
        assert_eq!(gen_unique_filename("a.txt", &existing, 16), "a (16).txt");
    }
}
