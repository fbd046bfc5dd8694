//! Scheme dispatch through a context built from config.

use portafile::{Context, FileError, FileHandle, PathHandle};
use portafile_config::testing::TestEnvironment;
use portafile_config::Config;

#[cfg(unix)]
#[test]
fn test_plain_and_file_uri_agree() {
    let ctx = Context::new();
    let resolver = ctx.resolver();

    let plain = resolver.resolve("/tmp/foo", false).unwrap();
    assert_eq!(plain.absolute_path(), "/tmp/foo");

    let from_uri = resolver.resolve("file:///tmp/foo", false).unwrap();
    assert_eq!(plain, from_uri);
    assert_eq!(from_uri, FileHandle::Path(PathHandle::new("/tmp/./foo")));
}

#[test]
fn test_garbage_falls_back_to_path() {
    let ctx = Context::new();
    let h = ctx.resolver().resolve("not a uri at all ???", false).unwrap();
    assert!(h.as_path().is_some());
    assert!(!h.is_absolute());
}

#[test]
fn test_windows_drive_is_a_path() {
    let ctx = Context::new();
    let h = ctx.resolver().resolve("C:\\Users\\me\\file.txt", false).unwrap();
    assert!(h.as_path().is_some());
    assert_eq!(h.path(), "C:\\Users\\me\\file.txt");
}

#[test]
fn test_configured_roots_enable_capabilities() {
    let env = TestEnvironment::new().unwrap();
    env.create_granted_file("a/b.txt", b"b").unwrap();
    let ctx = Context::from_config(&env.config());

    let h = ctx
        .resolver()
        .resolve(&env.capability_uri("a/b.txt"), false)
        .unwrap();
    assert!(h.as_capability().is_some());
    assert!(h.exists());
    assert_eq!(h.name(), "b.txt");
}

#[test]
fn test_path_only_host_rejects_capability_uris() {
    let env = TestEnvironment::new().unwrap();
    let mut config = env.config();
    config.resolver.enable_capabilities = false;
    let ctx = Context::from_config(&config);

    assert!(ctx.resolver().resolve(&env.capability_uri("x"), false).is_none());
    assert!(matches!(
        ctx.resolver().try_resolve(&env.capability_uri("x"), false),
        Err(FileError::UnsupportedScheme(_))
    ));
}

#[test]
fn test_unknown_authority_is_an_error() {
    let env = TestEnvironment::new().unwrap();
    let ctx = Context::from_config(&env.config());
    assert!(ctx
        .resolver()
        .try_resolve("content://nobody/x", false)
        .is_err());
}

#[test]
fn test_custom_scheme_from_config() {
    let env = TestEnvironment::new().unwrap();
    env.create_granted_file("doc.txt", b"").unwrap();
    let mut config: Config = env.config();
    config.resolver.capability_scheme = "grant".to_string();
    let ctx = Context::from_config(&config);

    assert!(ctx
        .resolver()
        .resolve("grant://sandbox/doc.txt", false)
        .is_some_and(|h| h.exists()));
    assert!(ctx.resolver().resolve(&env.capability_uri("doc.txt"), false).is_none());
}

#[test]
fn test_resolved_paths_share_context_cleanup() {
    let env = TestEnvironment::new().unwrap();
    let path = env.create_file("bye.txt", b"").unwrap();
    let ctx = Context::new();

    let h = ctx.resolver().resolve(path.to_str().unwrap(), false).unwrap();
    h.delete_on_exit().unwrap();
    drop(h);
    assert!(path.exists());
    drop(ctx);
    assert!(!path.exists());
}
