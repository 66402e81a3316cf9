//! Process-wide source line table for virtual filenames.
//!
//! Interactive commands never exist on disk, but tracebacks and source
//! introspection still need their text. Evaluation registers each command
//! under its virtual filename here; names carrying the reserved prefix
//! are served exclusively from this table, everything else falls back to
//! the filesystem. The table only ever grows.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

/// Filenames starting with this prefix never touch the filesystem.
pub const RESERVED_PREFIX: &str = "<adder#";

type Table = RwLock<HashMap<String, Arc<Vec<String>>>>;

fn table() -> &'static Table {
    static TABLE: OnceLock<Table> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Record the source for a virtual filename, replacing any earlier text
/// registered under the same name.
pub fn register(filename: &str, source: &str) {
    let lines: Vec<String> = source.lines().map(str::to_string).collect();
    table().write().insert(filename.to_string(), Arc::new(lines));
}

/// The registered lines for `filename`. Reserved names are looked up only
/// in the table; other names are read from disk.
pub fn lines(filename: &str) -> Option<Arc<Vec<String>>> {
    if filename.starts_with(RESERVED_PREFIX) {
        return table().read().get(filename).cloned();
    }
    if let Some(cached) = table().read().get(filename).cloned() {
        return Some(cached);
    }
    let content = fs::read_to_string(filename).ok()?;
    Some(Arc::new(content.lines().map(str::to_string).collect()))
}

/// A single 1-based line, if known.
pub fn line(filename: &str, lineno: usize) -> Option<String> {
    let lines = lines(filename)?;
    lineno.checked_sub(1).and_then(|i| lines.get(i)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_register_and_lookup() {
        register("<adder#9001>", "a = 1\nb = a + 1");
        let lines = lines("<adder#9001>").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(line("<adder#9001>", 2).as_deref(), Some("b = a + 1"));
    }

    #[test]
    fn test_reregistration_replaces_lines() {
        register("<adder#9002>", "first");
        register("<adder#9002>", "second");
        assert_eq!(line("<adder#9002>", 1).as_deref(), Some("second"));
    }

    #[test]
    fn test_reserved_names_never_hit_the_filesystem() {
        assert!(lines("<adder#no-such-entry>").is_none());
    }

    #[test]
    fn test_filesystem_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x = 42").unwrap();
        writeln!(file, "print(x)").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert_eq!(line(&path, 2).as_deref(), Some("print(x)"));
    }

    #[test]
    fn test_out_of_range_line() {
        register("<adder#9003>", "only = 1");
        assert!(line("<adder#9003>", 0).is_none());
        assert!(line("<adder#9003>", 2).is_none());
    }
}
