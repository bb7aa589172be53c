//! Model definitions
//!
//! Declarations (what the user asked for) and instances (what the provider
//! created) live in separate modules.

mod input;
mod instance;
mod resource;
mod stack_file;

// Re-exports
pub use input::*;
pub use instance::*;
pub use resource::*;
pub use stack_file::*;

/// Instance id of one member of an instance-set.
pub fn member_id(set: &str, key: &str) -> String {
    format!("{}.{}", set, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id() {
        assert_eq!(member_id("apps", "a"), "apps.a");
    }

    #[test]
    fn test_instance_serialization() {
        let instance = ResourceInstance::new("db", ResourceKind::Instance)
            .with_status(InstanceStatus::Ready)
            .with_attribute("private_ip", serde_json::json!("10.0.0.5"));

        let json = serde_json::to_string(&instance).unwrap();
        assert!(json.contains("\"status\":\"ready\""));
        assert!(json.contains("10.0.0.5"));

        let back: ResourceInstance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attribute_str("private_ip"), Some("10.0.0.5"));
        assert_eq!(back.kind, ResourceKind::Instance);
    }
}
