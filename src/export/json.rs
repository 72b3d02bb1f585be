//! JSON import/export of a user's review states.
//! Snapshots carry every scheduling field, so a restore reproduces the store exactly.

use crate::database::db;
use crate::error::{StoreError, StoreResult};
use crate::models::{ReviewState, Scheduler};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub flashcard_id: i64,
    #[serde(flatten)]
    pub state: ReviewState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewExport {
    pub user: String,
    pub cards: Vec<CardSnapshot>,
}

impl ReviewExport {
    pub fn from_store(conn: &Connection, user: &str) -> StoreResult<Self> {
        let cards = db::list_review_states(conn, user)?
            .into_iter()
            .map(|(flashcard_id, state)| CardSnapshot { flashcard_id, state })
            .collect();
        Ok(Self {
            user: user.to_string(),
            cards,
        })
    }

    /// Writes every snapshot back, replacing stored states for the same cards.
    ///
    /// Each snapshot must be a state `scheduler` could have produced. One
    /// bad snapshot rejects the whole import before anything is written.
    pub fn restore(&self, conn: &mut Connection, scheduler: &Scheduler) -> StoreResult<usize> {
        for card in &self.cards {
            scheduler.check_state(&card.state).map_err(|reason| {
                log::error!(
                    "Rejected import for '{}': flashcard {}: {reason}",
                    self.user,
                    card.flashcard_id
                );
                StoreError::InvalidSnapshot {
                    flashcard_id: card.flashcard_id,
                    reason,
                }
            })?;
        }

        let tx = conn.transaction()?;
        for card in &self.cards {
            db::save_review_state(&tx, &self.user, card.flashcard_id, &card.state)?;
        }
        tx.commit()?;
        Ok(self.cards.len())
    }
}

/// Exports review states to a JSON file at the specified path.
pub fn export_json_to_path(export: &ReviewExport, path: &Path) -> StoreResult<()> {
    let json_string = serde_json::to_string_pretty(export)?;
    let mut file = File::create(path)?;
    file.write_all(json_string.as_bytes())?;
    log::info!(
        "Exported {} review states of '{}' to {}",
        export.cards.len(),
        export.user,
        path.display()
    );
    Ok(())
}

/// Reads review states from a JSON file. Nothing is written to the store.
pub fn import_json(path: &Path) -> StoreResult<ReviewExport> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let export: ReviewExport = serde_json::from_str(&contents)?;

    log::info!(
        "Read {} review states of '{}' from {}",
        export.cards.len(),
        export.user,
        path.display()
    );
    Ok(export)
}
