use super::*;
use serde_json::{json, to_value};

#[test]
fn test_single_entry_payload_serialization() {
    let payload = AccessControlEntryPayload::single("repoV2/p1/r1", "vssgp.contrib", 0, 16);

    let value = to_value(&payload).expect("Failed to serialize payload");

    assert_eq!(
        value,
        json!({
            "token": "repoV2/p1/r1",
            "merge": true,
            "accessControlEntries": [{
                "descriptor": "vssgp.contrib",
                "allow": 0,
                "deny": 16,
                "extendedInfo": {
                    "effectiveAllow": 0,
                    "effectiveDeny": 16,
                    "inheritedAllow": 0,
                    "inheritedDeny": 16
                }
            }]
        })
    );
}

#[test]
fn test_git_namespace_id() {
    assert_eq!(GIT_SECURITY_NAMESPACE.len(), 36);
}
