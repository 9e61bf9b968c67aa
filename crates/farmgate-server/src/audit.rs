use farmgate_core::tuple::SnapshotToken;

pub fn audit_schema_write(force: bool, breaking_changes_overridden: bool, orphans_removed: usize) {
    tracing::info!(
        target: "audit",
        event = "schema_write",
        force = force,
        breaking_changes_overridden = breaking_changes_overridden,
        orphans_removed = orphans_removed,
        "schema written"
    );
}

pub fn audit_relationship_write(touch_count: usize, delete_count: usize, token: &SnapshotToken) {
    tracing::info!(
        target: "audit",
        event = "relationship_write",
        touch_count = touch_count,
        delete_count = delete_count,
        snapshot_token = token.value(),
        "relationships written"
    );
}

/// Records a denied authorization. `reason` is set when the denial came from
/// an evaluation failure rather than a negative check.
pub fn audit_access_denied(subject: &str, resource: &str, permission: &str, reason: Option<&str>) {
    tracing::warn!(
        target: "audit",
        event = "access_denied",
        subject = subject,
        resource = resource,
        permission = permission,
        reason = reason.unwrap_or("not permitted"),
        "access denied"
    );
}
