//! store.rs — in-memory movie-info records backing `/v1/records`.

use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::MovieInfo;

#[derive(Debug, Default)]
pub struct MovieInfoStore {
    // insertion order is kept so listings are stable
    inner: RwLock<Vec<MovieInfo>>,
}

/// Constraint violations for a record about to be created, sorted and joined with ", ".
pub fn validate(info: &MovieInfo) -> Result<(), String> {
    let mut problems = Vec::new();
    if info.name.trim().is_empty() {
        problems.push("Movie name must be provided");
    }
    if info.cast.iter().any(|c| c.trim().is_empty()) {
        problems.push("cast must be present");
    }
    if matches!(info.year, Some(y) if y <= 0) {
        problems.push("Year must be a positive number");
    }
    if problems.is_empty() {
        return Ok(());
    }
    problems.sort_unstable();
    Err(problems.join(", "))
}

impl MovieInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the record, assigning a fresh id when none was given. Same id replaces.
    pub fn save(&self, mut info: MovieInfo) -> MovieInfo {
        let id = info
            .movie_info_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        let mut v = self.inner.write();
        match v
            .iter_mut()
            .find(|m| m.movie_info_id.as_deref() == Some(id.as_str()))
        {
            Some(existing) => *existing = info.clone(),
            None => v.push(info.clone()),
        }
        info
    }

    /// Overwrite the editable fields of an existing record. `None` when the id is unknown.
    /// The id and the year stay as stored.
    pub fn update(&self, id: &str, changes: MovieInfo) -> Option<MovieInfo> {
        let mut v = self.inner.write();
        let existing = v
            .iter_mut()
            .find(|m| m.movie_info_id.as_deref() == Some(id))?;
        existing.name = changes.name;
        existing.description = changes.description;
        existing.cast = changes.cast;
        existing.release_date = changes.release_date;
        Some(existing.clone())
    }

    /// Remove a record. Deleting an unknown id is not an error; the return says whether one went.
    pub fn delete(&self, id: &str) -> bool {
        let mut v = self.inner.write();
        let before = v.len();
        v.retain(|m| m.movie_info_id.as_deref() != Some(id));
        v.len() != before
    }

    pub fn find_by_id(&self, id: &str) -> Option<MovieInfo> {
        self.inner
            .read()
            .iter()
            .find(|m| m.movie_info_id.as_deref() == Some(id))
            .cloned()
    }

    pub fn find_all(&self) -> Vec<MovieInfo> {
        self.inner.read().clone()
    }

    pub fn find_by_year(&self, year: i32) -> Vec<MovieInfo> {
        self.filtered(|m| m.year == Some(year))
    }

    pub fn find_by_name(&self, name: &str) -> Vec<MovieInfo> {
        self.filtered(|m| m.name == name)
    }

    fn filtered(&self, pred: impl Fn(&MovieInfo) -> bool) -> Vec<MovieInfo> {
        self.inner.read().iter().filter(|m| pred(m)).cloned().collect()
    }
}
