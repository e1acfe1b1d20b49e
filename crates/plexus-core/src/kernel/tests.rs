use crate::kernel::error::Error;
use crate::plugin_system::error::PluginSystemError;

#[test]
fn plugin_system_error_converts_into_kernel_error() {
    let err: Error = PluginSystemError::DuplicateId {
        plugin_id: "x".to_string(),
    }
    .into();
    match err {
        Error::PluginSystem(PluginSystemError::DuplicateId { plugin_id }) => {
            assert_eq!(plugin_id, "x");
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[test]
fn string_messages_convert_into_kernel_error() {
    let err: Error = "something odd".into();
    assert!(matches!(err, Error::Other(_)));
    assert_eq!(err.to_string(), "Error: something odd");
}
