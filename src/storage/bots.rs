//! Bot configuration records
//!
//! Each bot has one JSON document. Capital-preservation state (equity peak,
//! pause window) is written into it with an RFC 7386 merge patch so fields
//! owned by other subsystems are never clobbered; a null in the patch
//! removes the key.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Store;

/// Capital-preservation fields nested under `capital_preservation` in the
/// bot record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotCapitalState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_equity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<String>,
}

const CAPITAL_KEY: &str = "capital_preservation";

/// RFC 7386 merge patch: objects merge recursively, null deletes, anything
/// else replaces.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_map) = patch {
        if !target.is_object() {
            *target = json!({});
        }
        if let Value::Object(target_map) = target {
            for (key, value) in patch_map {
                if value.is_null() {
                    target_map.remove(key);
                } else {
                    merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
    } else {
        *target = patch.clone();
    }
}

impl Store {
    pub fn get_bot_record(&self, bot_id: &str) -> Result<Value> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT config FROM bots WHERE bot_id = ?1",
                params![bot_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read bot record")?;
        match raw {
            Some(text) => serde_json::from_str(&text)
                .with_context(|| format!("corrupt bot record for {}", bot_id)),
            None => Ok(json!({})),
        }
    }

    /// Partial-merge update of the bot record
    pub fn merge_bot_record(&self, bot_id: &str, patch: &Value) -> Result<()> {
        let mut record = self.get_bot_record(bot_id)?;
        merge_patch(&mut record, patch);
        let text = serde_json::to_string(&record).context("failed to serialize bot record")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO bots (bot_id, config) VALUES (?1, ?2)
             ON CONFLICT (bot_id) DO UPDATE SET config = excluded.config",
            params![bot_id, text],
        )
        .context("failed to write bot record")?;
        Ok(())
    }

    pub fn get_capital_state(&self, bot_id: &str) -> Result<BotCapitalState> {
        let record = self.get_bot_record(bot_id)?;
        match record.get(CAPITAL_KEY) {
            Some(v) => serde_json::from_value(v.clone())
                .with_context(|| format!("corrupt capital state for {}", bot_id)),
            None => Ok(BotCapitalState::default()),
        }
    }

    /// Merge capital fields into the bot record. `None` fields are written
    /// as explicit nulls so an expired pause is actually removed.
    pub fn set_capital_state(&self, bot_id: &str, state: &BotCapitalState) -> Result<()> {
        let patch = json!({
            CAPITAL_KEY: {
                "peak_equity": state.peak_equity,
                "paused_until": state.paused_until,
                "pause_reason": state.pause_reason,
            }
        });
        self.merge_bot_record(bot_id, &patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn merge_patch_follows_rfc7386() {
        let mut doc = json!({"a": {"b": 1, "c": 2}, "keep": true});
        merge_patch(&mut doc, &json!({"a": {"b": 5, "c": null}, "new": "x"}));
        assert_eq!(doc, json!({"a": {"b": 5}, "keep": true, "new": "x"}));
    }

    #[test]
    fn capital_state_does_not_clobber_unrelated_fields() {
        let store = Store::open_in_memory().unwrap();
        store
            .merge_bot_record("bot-1", &json!({"strategy": "momentum", "owner": "alice"}))
            .unwrap();

        let paused = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        store
            .set_capital_state(
                "bot-1",
                &BotCapitalState {
                    peak_equity: Some(250.0),
                    paused_until: Some(paused),
                    pause_reason: Some("loss streak".to_string()),
                },
            )
            .unwrap();

        let record = store.get_bot_record("bot-1").unwrap();
        assert_eq!(record["strategy"], "momentum");
        assert_eq!(record["owner"], "alice");

        let state = store.get_capital_state("bot-1").unwrap();
        assert_eq!(state.peak_equity, Some(250.0));
        assert_eq!(state.paused_until, Some(paused));
    }

    #[test]
    fn expired_pause_fields_are_removed_not_kept() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_capital_state(
                "bot-1",
                &BotCapitalState {
                    peak_equity: Some(100.0),
                    paused_until: Some(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()),
                    pause_reason: Some("drawdown".to_string()),
                },
            )
            .unwrap();

        store
            .set_capital_state(
                "bot-1",
                &BotCapitalState {
                    peak_equity: Some(100.0),
                    paused_until: None,
                    pause_reason: None,
                },
            )
            .unwrap();

        let state = store.get_capital_state("bot-1").unwrap();
        assert_eq!(state.peak_equity, Some(100.0));
        assert_eq!(state.paused_until, None);
        assert_eq!(state.pause_reason, None);
        // the keys are gone from the document itself
        let record = store.get_bot_record("bot-1").unwrap();
        assert!(record["capital_preservation"].get("paused_until").is_none());
    }

    #[test]
    fn unknown_bot_reads_as_defaults() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(
            store.get_capital_state("nobody").unwrap(),
            BotCapitalState::default()
        );
    }
}
