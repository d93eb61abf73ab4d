//! `SenderRights` derivation from the `ex` side channel.
//!
//! `ex` carries three boolean strings (`"true"`/`"false"`), not real JSON
//! booleans — a quirk of the upstream system this pipeline talks to. Ranks
//! are derived by precedence, highest-true wins; undocumented combinations
//! (e.g. `anchor_auth=true` together with `high_auth=true`) collapse to the
//! highest true flag rather than erroring, preserved from the source system.
//!
//! Exposed publicly (not just `pub(crate)`) so a future revoke-authorization
//! handler can reuse the same rank derivation without re-deriving it.

use crate::model::SenderRights;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ExFlags {
    #[serde(default, deserialize_with = "bool_from_string_opt")]
    anchor_auth: bool,
    #[serde(default, deserialize_with = "bool_from_string_opt")]
    operation_auth: bool,
    #[serde(default, deserialize_with = "bool_from_string_opt")]
    high_auth: bool,
}

fn bool_from_string_opt<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let raw = String::deserialize(deserializer)?;
    match raw.as_str() {
        "true" => Ok(true),
        "false" | "" => Ok(false),
        other => Err(D::Error::custom(format!("invalid bool string: {other}"))),
    }
}

/// Parse `SenderRights` from a message's `ex` JSON blob. Missing or
/// unparseable `ex` defaults to `Ordinary` (rank 0) — the conservative,
/// most-checked path.
pub fn parse_sender_rights(ex: Option<&str>) -> SenderRights {
    let Some(raw) = ex else {
        return SenderRights::Ordinary;
    };
    let Ok(flags) = serde_json::from_str::<ExFlags>(raw) else {
        return SenderRights::Ordinary;
    };

    if flags.high_auth {
        SenderRights::HighAuth
    } else if flags.operation_auth {
        SenderRights::OperationAuth
    } else if flags.anchor_auth {
        SenderRights::AnchorAuth
    } else {
        SenderRights::Ordinary
    }
}
