use std::path::Path;

/// Suffix appended to a name that is already taken in the store directory.
pub const DISAMBIGUATION_SUFFIX: &str = "_new";

const FALLBACK_NAME: &str = "document";

/// Strip everything from an attacker-controlled attachment name that could make it
/// more than a single path component: spaces, `..`, `/` and `\`.
///
/// Stripping repeats until nothing changes, so `.. .` or `....` cannot collapse into a
/// fresh `..` after one pass.
pub fn sanitize_file_name(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    loop {
        let next = name
            .replace(' ', "")
            .replace("..", "")
            .replace(['/', '\\'], "");
        if next == name {
            break;
        }
        name = next;
    }

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// Pick a name under `dir` that no existing file uses.
///
/// Free names are returned unchanged. Otherwise `_new` is appended, then `_new2`,
/// `_new3`, ... until the name is free.
pub fn resolve_file_name(candidate: &str, dir: &Path) -> String {
    if !dir.join(candidate).exists() {
        return candidate.to_string();
    }

    let first = format!("{candidate}{DISAMBIGUATION_SUFFIX}");
    if !dir.join(&first).exists() {
        return first;
    }

    let mut n = 2usize;
    loop {
        let name = format!("{candidate}{DISAMBIGUATION_SUFFIX}{n}");
        if !dir.join(&name).exists() {
            return name;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tmp_dir;

    #[test]
    fn sanitize_strips_spaces_separators_and_parent_refs() {
        assert_eq!(sanitize_file_name("  my movie.torrent "), "mymovie.torrent");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_file_name("..\\..\\win.torrent"), "win.torrent");
        assert_eq!(sanitize_file_name("a/b/c.torrent"), "abc.torrent");
    }

    #[test]
    fn sanitize_cannot_reassemble_parent_refs() {
        for raw in ["....", ". . /.", "..././", ".. ..", "./."] {
            let out = sanitize_file_name(raw);
            assert!(!out.contains(".."), "{raw:?} -> {out:?}");
            assert!(!out.contains('/'), "{raw:?} -> {out:?}");
            assert!(!out.contains(' '), "{raw:?} -> {out:?}");
        }
    }

    #[test]
    fn sanitize_empty_falls_back() {
        assert_eq!(sanitize_file_name(""), "document");
        assert_eq!(sanitize_file_name(" / .. "), "document");
    }

    #[test]
    fn resolve_keeps_free_name() {
        let dir = tmp_dir("tbot-naming-free");
        assert_eq!(resolve_file_name("plan.torrent", &dir), "plan.torrent");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn resolve_appends_suffix_then_counts() {
        let dir = tmp_dir("tbot-naming-taken");
        std::fs::write(dir.join("plan.torrent"), b"1").unwrap();
        assert_eq!(resolve_file_name("plan.torrent", &dir), "plan.torrent_new");

        std::fs::write(dir.join("plan.torrent_new"), b"2").unwrap();
        assert_eq!(resolve_file_name("plan.torrent", &dir), "plan.torrent_new2");

        std::fs::write(dir.join("plan.torrent_new2"), b"3").unwrap();
        assert_eq!(resolve_file_name("plan.torrent", &dir), "plan.torrent_new3");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
