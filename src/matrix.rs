//! Rotation matrix of (model, API key) cells with per-cell cooldowns.
//!
//! Cells are visited models-first in configured priority order, then keys in
//! configured order, so the preferred model is always tried first and the
//! rotation is reproducible. A cell that fails is blocked for a fixed
//! duration; the matrix is exhausted when every cell is blocked.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// An API key. The secret never appears in Debug or Display output.
#[derive(Clone)]
pub struct ApiKey {
    secret: String,
}

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Coordinates of one cell: model position and key position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId {
    pub model: usize,
    pub key: usize,
}

/// A usable cell handed out by the matrix
#[derive(Debug, Clone)]
pub struct Cell<'a> {
    pub id: CellId,
    pub model: &'a str,
    pub api_key: &'a ApiKey,
}

impl fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key #{} ({})", self.id.key + 1, self.model)
    }
}

#[derive(Debug, Clone)]
pub struct CooldownMatrix {
    models: Vec<String>,
    keys: Vec<ApiKey>,
    expiries: HashMap<CellId, DateTime<Utc>>,
}

impl CooldownMatrix {
    pub fn new(models: Vec<String>, keys: Vec<ApiKey>) -> Self {
        Self {
            models,
            keys,
            expiries: HashMap::new(),
        }
    }

    pub fn from_config(models: &[String], api_keys: &[String]) -> Self {
        Self::new(
            models.to_vec(),
            api_keys.iter().map(ApiKey::new).collect(),
        )
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn cell_count(&self) -> usize {
        self.models.len() * self.keys.len()
    }

    /// Cells in rotation order
    fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.models.len())
            .flat_map(move |model| (0..self.keys.len()).map(move |key| CellId { model, key }))
    }

    fn cell(&self, id: CellId) -> Cell<'_> {
        Cell {
            id,
            model: &self.models[id.model],
            api_key: &self.keys[id.key],
        }
    }

    pub fn is_available_at(&self, id: CellId, now: DateTime<Utc>) -> bool {
        self.expiries.get(&id).is_none_or(|expiry| now >= *expiry)
    }

    /// First usable cell in rotation order, or `None` when every cell cools down
    pub fn next_available(&self) -> Option<Cell<'_>> {
        self.next_available_at(Utc::now())
    }

    pub fn next_available_at(&self, now: DateTime<Utc>) -> Option<Cell<'_>> {
        self.cell_ids()
            .find(|id| self.is_available_at(*id, now))
            .map(|id| self.cell(id))
    }

    /// Put a cell in cooldown for `duration` starting now
    pub fn block(&mut self, id: CellId, duration: Duration) {
        self.block_at(id, Utc::now(), duration);
    }

    pub fn block_at(&mut self, id: CellId, now: DateTime<Utc>, duration: Duration) {
        let duration = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let expiry = now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expiries.insert(id, expiry);

        info!(
            "🔒 key #{} ({}) blocked until {}",
            id.key + 1,
            self.models[id.model],
            expiry.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    /// Lift every cooldown
    pub fn reset_all(&mut self) {
        debug!("Clearing {} cooldown(s)", self.expiries.len());
        self.expiries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn matrix() -> CooldownMatrix {
        CooldownMatrix::from_config(
            &["flash".to_string(), "pro".to_string()],
            &["k1".to_string(), "k2".to_string()],
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
    }

    fn order(matrix: &mut CooldownMatrix, now: DateTime<Utc>) -> Vec<(String, usize)> {
        let mut visited = Vec::new();
        while let Some(cell) = matrix.next_available_at(now) {
            visited.push((cell.model.to_string(), cell.id.key));
            let id = cell.id;
            matrix.block_at(id, now, Duration::from_secs(60));
        }
        visited
    }

    #[test]
    fn test_rotation_is_models_first_then_keys() {
        let mut matrix = matrix();
        let visited = order(&mut matrix, t0());

        assert_eq!(
            visited,
            vec![
                ("flash".to_string(), 0),
                ("flash".to_string(), 1),
                ("pro".to_string(), 0),
                ("pro".to_string(), 1),
            ]
        );
        assert!(matrix.next_available_at(t0()).is_none());
    }

    #[test]
    fn test_cooldown_window_is_half_open() {
        let mut matrix = matrix();
        let id = CellId { model: 0, key: 0 };
        let d = Duration::from_secs(3600);
        matrix.block_at(id, t0(), d);

        assert!(!matrix.is_available_at(id, t0()));
        assert!(!matrix.is_available_at(id, t0() + chrono::Duration::seconds(3599)));
        assert!(matrix.is_available_at(id, t0() + chrono::Duration::seconds(3600)));
        assert!(matrix.is_available_at(CellId { model: 0, key: 1 }, t0()));
    }

    #[test]
    fn test_reset_restores_first_cell() {
        let mut matrix = matrix();
        order(&mut matrix, t0());
        assert!(matrix.next_available_at(t0()).is_none());

        matrix.reset_all();
        let cell = matrix.next_available_at(t0()).unwrap();
        assert_eq!(cell.id, CellId { model: 0, key: 0 });
        assert_eq!(cell.model, "flash");
    }

    #[test]
    fn test_key_secret_hidden_from_debug() {
        let matrix = matrix();
        let cell = matrix.next_available_at(t0()).unwrap();
        assert!(!format!("{:?}", cell).contains("k1"));
        assert_eq!(cell.api_key.secret(), "k1");
        assert_eq!(cell.to_string(), "key #1 (flash)");
    }
}
