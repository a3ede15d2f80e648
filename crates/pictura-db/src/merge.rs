use serde_json::Value;

/// Deep-merge `patch` into `target`.
///
/// Objects merge key by key, recursively; any other value in `patch` replaces
/// the value in `target`. Keys absent from `patch` are left untouched.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => deep_merge(slot, value),
                    _ => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
