use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::parser::DetailRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS lists (
            id         INTEGER PRIMARY KEY,
            name       TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS list_movies (
            id             INTEGER PRIMARY KEY,
            list_id        INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
            url            TEXT NOT NULL,
            title          TEXT NOT NULL,
            year           TEXT NOT NULL,
            critic_score   TEXT NOT NULL,
            audience_score TEXT NOT NULL,
            consensus      TEXT NOT NULL,
            saved_at       TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(list_id, url)
        );
        CREATE INDEX IF NOT EXISTS idx_list_movies_list ON list_movies(list_id);
        ",
    )?;
    Ok(())
}

pub struct ListSummary {
    pub name: String,
    pub movies: usize,
}

// ── Lists ──

/// Id of the list called `name`, creating it if missing.
pub fn create_list(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "List name must not be empty");
    conn.execute("INSERT OR IGNORE INTO lists (name) VALUES (?1)", [name])?;
    let id = conn.query_row("SELECT id FROM lists WHERE name = ?1", [name], |row| row.get(0))?;
    Ok(id)
}

pub fn fetch_lists(conn: &Connection) -> Result<Vec<ListSummary>> {
    let mut stmt = conn.prepare(
        "SELECT l.name, COUNT(m.id)
         FROM lists l
         LEFT JOIN list_movies m ON m.list_id = l.id
         GROUP BY l.id
         ORDER BY l.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ListSummary {
                name: row.get(0)?,
                movies: row.get::<_, i64>(1)? as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn list_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM lists WHERE name = ?1", [name.trim()], |row| row.get(0))
        .optional()?;
    Ok(id)
}

// ── Movies ──

/// Save into `list` (created on demand). The same URL saved twice keeps only
/// the latest record.
pub fn save_movie(conn: &Connection, list: &str, record: &DetailRecord) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    let id = create_list(&tx, list)?;
    tx.execute(
        "INSERT OR REPLACE INTO list_movies
            (list_id, url, title, year, critic_score, audience_score, consensus)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id,
            record.source_url,
            record.title,
            record.year,
            record.critic_score,
            record.audience_score,
            record.consensus,
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// Movies of `list` in the order they were saved, or `None` if no such list.
pub fn fetch_list(conn: &Connection, list: &str) -> Result<Option<Vec<DetailRecord>>> {
    let Some(id) = list_id(conn, list)? else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT title, year, critic_score, audience_score, consensus, url
         FROM list_movies WHERE list_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([id], |row| {
            Ok(DetailRecord {
                title: row.get(0)?,
                year: row.get(1)?,
                critic_score: row.get(2)?,
                audience_score: row.get(3)?,
                consensus: row.get(4)?,
                source_url: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(rows))
}

/// Remove the `index`-th (1-based) movie of `list`, returning it.
pub fn remove_from_list(conn: &Connection, list: &str, index: usize) -> Result<DetailRecord> {
    let movies = fetch_list(conn, list)?.with_context(|| format!("No list named '{}'", list))?;
    let record = index
        .checked_sub(1)
        .and_then(|i| movies.get(i))
        .cloned()
        .with_context(|| format!("'{}' has no movie #{} ({} saved)", list, index, movies.len()))?;

    let id = list_id(conn, list)?.context("List disappeared")?;
    conn.execute(
        "DELETE FROM list_movies WHERE list_id = ?1 AND url = ?2",
        rusqlite::params![id, record.source_url],
    )?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&dir.path().join("data/lists.sqlite")).unwrap();
        (dir, conn)
    }

    fn movie(title: &str, url: &str) -> DetailRecord {
        DetailRecord {
            title: title.to_string(),
            year: "2010".to_string(),
            critic_score: "87".to_string(),
            audience_score: "91".to_string(),
            consensus: "No consensus yet.".to_string(),
            source_url: url.to_string(),
        }
    }

    #[test]
    fn create_is_idempotent() {
        let (_dir, conn) = open();
        let a = create_list(&conn, "favourites").unwrap();
        let b = create_list(&conn, " favourites ").unwrap();
        assert_eq!(a, b);
        assert!(create_list(&conn, "  ").is_err());
        let lists = fetch_lists(&conn).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].movies, 0);
    }

    #[test]
    fn save_show_and_count() {
        let (_dir, conn) = open();
        save_movie(&conn, "nolan", &movie("Inception", "https://rt/m/inception")).unwrap();
        save_movie(&conn, "nolan", &movie("Tenet", "https://rt/m/tenet")).unwrap();
        save_movie(&conn, "heist", &movie("Heat", "https://rt/m/heat")).unwrap();

        let lists = fetch_lists(&conn).unwrap();
        let counts: Vec<_> = lists.iter().map(|l| (l.name.as_str(), l.movies)).collect();
        assert_eq!(counts, vec![("heist", 1), ("nolan", 2)]);

        let nolan = fetch_list(&conn, "nolan").unwrap().unwrap();
        assert_eq!(nolan[0].title, "Inception");
        assert_eq!(nolan[1].title, "Tenet");
        assert!(fetch_list(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn saving_same_url_replaces() {
        let (_dir, conn) = open();
        save_movie(&conn, "l", &movie("Old Title", "https://rt/m/x")).unwrap();
        save_movie(&conn, "l", &movie("New Title", "https://rt/m/x")).unwrap();
        let movies = fetch_list(&conn, "l").unwrap().unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "New Title");
    }

    #[test]
    fn remove_by_index() {
        let (_dir, conn) = open();
        save_movie(&conn, "l", &movie("A", "https://rt/m/a")).unwrap();
        save_movie(&conn, "l", &movie("B", "https://rt/m/b")).unwrap();
        save_movie(&conn, "l", &movie("C", "https://rt/m/c")).unwrap();

        let removed = remove_from_list(&conn, "l", 2).unwrap();
        assert_eq!(removed.title, "B");
        let left: Vec<_> = fetch_list(&conn, "l").unwrap().unwrap().into_iter().map(|m| m.title).collect();
        assert_eq!(left, vec!["A", "C"]);

        assert!(remove_from_list(&conn, "l", 0).is_err());
        assert!(remove_from_list(&conn, "l", 3).is_err());
        assert!(remove_from_list(&conn, "nope", 1).is_err());
    }
}
