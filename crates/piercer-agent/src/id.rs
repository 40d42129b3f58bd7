//! A stable, disk-persisted identifier for this agent process.
//!
//! Minted once on first run and reused on every later start so the
//! controller recognizes a restarted agent as the same fleet member instead
//! of a brand new one.

use std::path::Path;

const FILE_NAME: &str = "agent-id.txt";

/// Read `<data_dir>/agent-id.txt`, creating it (and `data_dir`) with a fresh
/// id if it doesn't exist yet.
pub fn load_or_create(data_dir: &Path) -> std::io::Result<String> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(FILE_NAME);
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(contents.trim().to_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let id = uuid::Uuid::new_v4().to_string();
            std::fs::write(&path, &id)?;
            Ok(id)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn a_fresh_directory_gets_a_new_id_that_is_reused_on_reread() {
        let dir = tempdir();
        let first = load_or_create(&dir).unwrap();
        let second = load_or_create(&dir).unwrap();
        assert_eq!(first, second);
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("piercer-agent-test-{}", uuid::Uuid::new_v4()));
        dir
    }
}
