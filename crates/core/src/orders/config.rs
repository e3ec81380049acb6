use log::warn;
use serde::{Deserialize, Serialize};

use super::relations::RelationKind;
use super::writer::DEFAULT_UPDATE_CHUNK_SIZE;

pub const ENV_UPDATE_CHUNK: &str = "ORDER_SYNC_UPDATE_CHUNK";
pub const ENV_WRITE_MODE: &str = "ORDER_SYNC_WRITE_MODE";
pub const ENV_RELATIONS: &str = "ORDER_SYNC_RELATIONS";

/// How order headers are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// One insert for all new orders, chunked update transactions.
    #[default]
    Bulk,
    /// One transaction per order; failures are counted and the batch goes on.
    PerRecord,
}

impl WriteMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bulk" => Some(Self::Bulk),
            "per_record" | "per-record" | "record" => Some(Self::PerRecord),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncEngineConfig {
    pub update_chunk_size: usize,
    pub write_mode: WriteMode,
    /// Relation kinds to reconcile, in order.
    pub relations: Vec<RelationKind>,
    /// Recover from a unique violation on the bulk insert by re-resolving
    /// the insert set instead of failing the batch.
    pub retry_insert_conflicts: bool,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            update_chunk_size: DEFAULT_UPDATE_CHUNK_SIZE,
            write_mode: WriteMode::Bulk,
            relations: RelationKind::ALL.to_vec(),
            retry_insert_conflicts: true,
        }
    }
}

impl SyncEngineConfig {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` on top of the defaults. Invalid values
    /// are logged and ignored.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_UPDATE_CHUNK) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.update_chunk_size = size,
                _ => warn!("Ignoring invalid {}: {:?}", ENV_UPDATE_CHUNK, raw),
            }
        }

        if let Some(raw) = lookup(ENV_WRITE_MODE) {
            match WriteMode::parse(&raw) {
                Some(mode) => config.write_mode = mode,
                None => warn!("Ignoring invalid {}: {:?}", ENV_WRITE_MODE, raw),
            }
        }

        if let Some(raw) = lookup(ENV_RELATIONS) {
            let mut kinds = Vec::new();
            let mut valid = true;
            for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
                match RelationKind::parse(part) {
                    Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
                    Some(_) => {}
                    None => valid = false,
                }
            }
            if valid {
                config.relations = kinds;
            } else {
                warn!("Ignoring invalid {}: {:?}", ENV_RELATIONS, raw);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_use_bulk_mode_and_all_relations() {
        let config = SyncEngineConfig::from_env_with(lookup(&[]));
        assert_eq!(config, SyncEngineConfig::default());
        assert_eq!(config.update_chunk_size, 50);
        assert_eq!(config.relations[0], RelationKind::Items);
        assert_eq!(config.relations.len(), 5);
    }

    #[test]
    fn environment_overrides_apply() {
        let config = SyncEngineConfig::from_env_with(lookup(&[
            (ENV_UPDATE_CHUNK, "200"),
            (ENV_WRITE_MODE, "per_record"),
            (ENV_RELATIONS, "notes, items"),
        ]));
        assert_eq!(config.update_chunk_size, 200);
        assert_eq!(config.write_mode, WriteMode::PerRecord);
        assert_eq!(config.relations, vec![RelationKind::Notes, RelationKind::Items]);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let config = SyncEngineConfig::from_env_with(lookup(&[
            (ENV_UPDATE_CHUNK, "0"),
            (ENV_WRITE_MODE, "parallel"),
            (ENV_RELATIONS, "items,customers"),
        ]));
        assert_eq!(config, SyncEngineConfig::default());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: SyncEngineConfig =
            serde_json::from_str(r#"{"writeMode":"per_record"}"#).expect("config");
        assert_eq!(config.write_mode, WriteMode::PerRecord);
        assert_eq!(config.update_chunk_size, 50);
    }
}
