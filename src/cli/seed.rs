//! JSON seed files for the in-memory lists served by the binary.
//!
//! A seed file maps list keys to arrays of items:
//!
//! ```json
//! { "User": [{ "id": "1", "email": "ada@example.com", "password": "correct horse" }] }
//! ```
//!
//! Items without an `id` get a ULID. Secrets of the authentication list that
//! are not already Argon2 PHC strings are hashed when loading.

use crate::{
    auth::hash_secret,
    lists::{Item, List, Lists, MemoryAdapter},
};
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
    sync::Arc,
};
use tracing::debug;
use ulid::Ulid;

const PHC_ARGON2_PREFIX: &str = "$argon2";

pub type Seed = BTreeMap<String, Vec<Item>>;

/// Read and parse a seed file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid seed.
pub fn load(path: &Path) -> Result<Seed> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    parse(&json).with_context(|| format!("Invalid seed file: {}", path.display()))
}

/// Parse seed JSON, assigning ids to items that have none.
///
/// # Errors
/// Returns an error for non-object items, non-string ids or duplicate ids.
pub fn parse(json: &str) -> Result<Seed> {
    let mut seed: Seed = serde_json::from_str(json)?;

    for (key, items) in &mut seed {
        let mut seen = HashSet::new();
        for item in items.iter_mut() {
            let object = item
                .as_object_mut()
                .ok_or_else(|| anyhow!("{key}: items must be JSON objects"))?;
            let id = match object.get("id") {
                None | Some(Value::Null) => {
                    let id = Ulid::new().to_string();
                    object.insert("id".to_string(), Value::String(id.clone()));
                    id
                }
                Some(Value::String(id)) => id.clone(),
                Some(other) => bail!("{key}: item id must be a string, got {other}"),
            };
            if !seen.insert(id.clone()) {
                bail!("{key}: duplicate item id {id}");
            }
        }
    }

    Ok(seed)
}

/// Hash plain text values of `field`, leaving existing Argon2 hashes alone.
///
/// # Errors
/// Returns an error if a value is not a string or hashing fails.
pub fn hash_secrets(items: &mut [Item], field: &str) -> Result<usize> {
    let mut hashed = 0;
    for item in items.iter_mut() {
        let Some(value) = item.get_mut(field) else {
            continue;
        };
        let secret = match value {
            Value::Null => continue,
            Value::String(secret) if secret.starts_with(PHC_ARGON2_PREFIX) => continue,
            Value::String(secret) => secret.clone(),
            other => bail!("{field} must be a string, got {other}"),
        };
        *value = Value::String(hash_secret(&secret)?);
        hashed += 1;
    }
    Ok(hashed)
}

/// Build in-memory lists from a seed, hiding `secret_field` on the auth list.
///
/// # Errors
/// Returns an error if the auth list is missing from the seed or its secrets
/// cannot be hashed.
pub fn into_lists(mut seed: Seed, auth_list: Option<&str>, secret_field: &str) -> Result<Lists> {
    if let Some(auth_list) = auth_list {
        let items = seed
            .get_mut(auth_list)
            .ok_or_else(|| anyhow!("authentication list {auth_list} is not in the seed"))?;
        let hashed = hash_secrets(items, secret_field)?;
        debug!("hashed {} plain text secrets in {}", hashed, auth_list);
    }

    let mut lists = Lists::new();
    for (key, items) in seed {
        debug!("seeding list {} with {} items", key, items.len());
        let mut list = List::new(key.as_str(), Arc::new(MemoryAdapter::with_items(items)));
        if auth_list == Some(key.as_str()) {
            list = list.with_hidden_fields([secret_field]);
        }
        lists.insert(list);
    }
    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lists::Adapter;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn parse_assigns_missing_ids() {
        let seed = parse(r#"{"Todo": [{"title": "write docs"}, {"id": "7", "title": "ship"}]}"#)
            .expect("seed");
        let todos = &seed["Todo"];
        assert_eq!(todos.len(), 2);
        let generated = todos[0]["id"].as_str().expect("generated id");
        assert!(Ulid::from_string(generated).is_ok());
        assert_eq!(todos[1]["id"], "7");
    }

    #[test]
    fn parse_rejects_bad_items() {
        assert!(parse(r#"{"Todo": ["not an object"]}"#).is_err());
        assert!(parse(r#"{"Todo": [{"id": 7}]}"#).is_err());
        let err = parse(r#"{"Todo": [{"id": "1"}, {"id": "1"}]}"#).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate item id 1"));
        assert!(parse("[]").is_err());
    }

    #[test]
    fn hash_secrets_skips_existing_hashes() {
        let existing = hash_secret("already").expect("hash");
        let mut items = vec![
            json!({ "id": "1", "password": "plain" }),
            json!({ "id": "2", "password": existing.clone() }),
            json!({ "id": "3" }),
        ];
        assert_eq!(hash_secrets(&mut items, "password").expect("hashed"), 1);
        let first = items[0]["password"].as_str().expect("string");
        assert!(first.starts_with(PHC_ARGON2_PREFIX));
        assert_eq!(items[1]["password"], json!(existing));

        let mut bad = vec![json!({ "id": "1", "password": 42 })];
        assert!(hash_secrets(&mut bad, "password").is_err());
    }

    #[tokio::test]
    async fn into_lists_hides_the_secret_field() {
        let seed = parse(
            r#"{"User": [{"id": "1", "email": "ada@example.com", "password": "pw"}], "Todo": []}"#,
        )
        .expect("seed");
        let lists = into_lists(seed, Some("User"), "password").expect("lists");
        assert_eq!(lists.keys().collect::<Vec<_>>(), vec!["Todo", "User"]);

        let users = lists.get("User").expect("user list");
        assert_eq!(users.hidden_fields(), ["password".to_string()]);
        let stored = users
            .adapter()
            .find_by_id("1")
            .await
            .expect("lookup")
            .expect("user");
        assert!(stored["password"]
            .as_str()
            .is_some_and(|hash| hash.starts_with(PHC_ARGON2_PREFIX)));
        assert!(lists.get("Todo").expect("todo list").hidden_fields().is_empty());
    }

    #[test]
    fn into_lists_requires_the_auth_list() {
        let seed = parse(r#"{"Todo": []}"#).expect("seed");
        assert!(into_lists(seed, Some("User"), "password").is_err());
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"Post": [{{"id": "p1"}}]}}"#).expect("write");
        let seed = load(file.path()).expect("seed");
        assert_eq!(seed["Post"].len(), 1);

        let missing = load(Path::new("/nonexistent/keystone-seed.json"));
        assert!(missing.is_err());
    }
}
