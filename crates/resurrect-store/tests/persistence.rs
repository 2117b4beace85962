// A hook invocation is a short-lived process: whatever it writes must be
// readable by the next invocation that opens the same file.

use resurrect_store::{SqliteStore, StateStore};
use serde_json::json;

#[test]
fn value_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store
            .set("resurrect", &json!({"env": {"A": "1"}, "pid": 4242}))
            .unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let value = store.get("resurrect").unwrap().unwrap();
    assert_eq!(value["pid"], 4242);
    assert_eq!(value["env"]["A"], "1");
}

#[test]
fn reopen_does_not_reset_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    SqliteStore::open(&path).unwrap().set("k", &json!("v")).unwrap();
    // Second open runs init_db again; the row must still be there.
    SqliteStore::open(&path).unwrap();
    assert_eq!(
        SqliteStore::open(&path).unwrap().get("k").unwrap(),
        Some(json!("v"))
    );
}
