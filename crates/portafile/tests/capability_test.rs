//! Capability handles over the directory-backed and in-memory providers.

use std::fs;
use std::io::Write;
use std::sync::Arc;

use portafile::{CapabilityHandle, Context, FileError, FileHandle, MemoryProvider};
use portafile_config::testing::TestEnvironment;

fn tree_context(env: &TestEnvironment) -> Context {
    Context::from_config(&env.config())
}

#[test]
fn test_capability_space_queries_are_unsupported() {
    let env = TestEnvironment::new().unwrap();
    let ctx = tree_context(&env);
    let root = ctx
        .resolver()
        .resolve(&env.capability_uri(""), true)
        .unwrap();

    // Never a silent 0
    let err = root.total_space().unwrap_err();
    assert!(matches!(
        err,
        FileError::Unsupported {
            op: "total_space",
            variant: "capability"
        }
    ));
    assert!(root.free_space().unwrap_err().is_unsupported());
    assert!(root.usable_space().unwrap_err().is_unsupported());
}

#[test]
fn test_tree_handle_materializes_children() {
    let env = TestEnvironment::new().unwrap();
    let ctx = tree_context(&env);
    let root = ctx
        .resolver()
        .resolve(&env.capability_uri(""), true)
        .unwrap();
    assert!(root.is_directory());
    assert!(!root.is_absolute());
    assert_eq!(root.absolute_path(), root.path());

    let photos = root.child("photos", true, None).unwrap();
    assert!(env.granted_root.join("photos").is_dir());
    assert!(photos.is_directory());

    let pic = photos.child("cat.png", false, Some("image/png")).unwrap();
    assert!(pic.is_file());
    assert_eq!(pic.name(), "cat.png");
    assert_eq!(pic.name_without_extension(), "cat");
    assert_eq!(pic.parent_file().unwrap(), photos);

    // Lookup before creation
    let again = photos.child("cat.png", false, None).unwrap();
    assert_eq!(again, pic);
    assert_eq!(photos.list().unwrap(), vec!["cat.png"]);

    // createNewFile and mkdir succeed trivially
    assert!(pic.create_new_file());
    assert!(photos.mkdirs());
}

#[test]
fn test_streams_through_provider() {
    let env = TestEnvironment::new().unwrap();
    env.create_granted_file("inbox/msg.txt", b"old content").unwrap();
    let ctx = tree_context(&env);
    let msg = ctx
        .resolver()
        .resolve(&env.capability_uri("inbox/msg.txt"), false)
        .unwrap();

    assert!(msg.exists());
    assert_eq!(msg.length(), 11);
    assert!(msg.can_read().unwrap());

    let mut sink = msg.open_output_stream(false).unwrap();
    sink.write_all(b"new").unwrap();
    sink.close().unwrap();
    assert_eq!(
        msg.open_input_stream().unwrap().read_string().unwrap(),
        "new"
    );

    msg.open_output_stream(true)
        .unwrap()
        .write_all(b"er")
        .unwrap();
    assert_eq!(
        fs::read_to_string(env.granted_root.join("inbox/msg.txt")).unwrap(),
        "newer"
    );
}

#[test]
fn test_rename_uses_destination_name() {
    let env = TestEnvironment::new().unwrap();
    env.create_granted_file("draft.md", b"#").unwrap();
    let ctx = tree_context(&env);
    let resolver = ctx.resolver();
    let draft = resolver.resolve(&env.capability_uri("draft.md"), true).unwrap();
    let target = resolver.resolve(&env.capability_uri("final.md"), true).unwrap();

    assert!(draft.rename_to(&target));
    assert!(!draft.exists());
    assert!(target.exists());
    assert!(env.granted_root.join("final.md").is_file());
}

#[test]
fn test_delete_removes_document() {
    let env = TestEnvironment::new().unwrap();
    env.create_granted_file("old/a.txt", b"a").unwrap();
    let ctx = tree_context(&env);
    let dir = ctx
        .resolver()
        .resolve(&env.capability_uri("old"), true)
        .unwrap();

    assert!(dir.delete());
    assert!(!env.granted_root.join("old").exists());
    assert!(!dir.exists());
}

#[test]
fn test_filesystem_only_operations_fail_fast() {
    let env = TestEnvironment::new().unwrap();
    env.create_granted_file("f.bin", b"").unwrap();
    let ctx = tree_context(&env);
    let f = ctx
        .resolver()
        .resolve(&env.capability_uri("f.bin"), false)
        .unwrap();

    assert!(f.canonical_path().unwrap_err().is_unsupported());
    assert!(f.canonical_file().unwrap_err().is_unsupported());
    assert!(f.can_execute().unwrap_err().is_unsupported());
    assert!(f.set_last_modified(0).unwrap_err().is_unsupported());
    assert!(f.set_read_only().unwrap_err().is_unsupported());
    assert!(f.set_readable(true, false).unwrap_err().is_unsupported());
    assert!(f.set_writable_for_owner(true).unwrap_err().is_unsupported());
    assert!(f.set_executable(true, true).unwrap_err().is_unsupported());
    assert!(f.permissions().unwrap_err().is_unsupported());
    assert!(f.delete_on_exit().unwrap_err().is_unsupported());
    assert!(f.is_hidden().unwrap_err().is_unsupported());
}

#[test]
fn test_equality_is_by_uri() {
    let provider = Arc::new(MemoryProvider::new("mem", "box"));
    let root = provider.root_uri();
    let a = CapabilityHandle::new(provider.clone(), &root, true).unwrap();
    let b = CapabilityHandle::new(provider, &root, false).unwrap();
    assert_eq!(FileHandle::from(a), FileHandle::from(b));
}

#[test]
fn test_paths_sort_before_capabilities() {
    let provider = Arc::new(MemoryProvider::new("mem", "box"));
    let root = provider.root_uri();
    let cap = FileHandle::from(CapabilityHandle::new(provider, &root, true).unwrap());
    let path = FileHandle::from(std::path::PathBuf::from("/zzz"));

    let mut all = vec![cap.clone(), path.clone()];
    all.sort();
    assert_eq!(all, vec![path, cap]);
}

#[test]
fn test_memory_provider_round_trip() {
    let ctx = Context::new()
        .with_default_mime_type("text/plain")
        .with_provider(Arc::new(MemoryProvider::new("mem", "box")));
    let root = ctx.resolver().resolve("mem://box/document/0", true).unwrap();

    let doc = root.child("hello.txt", false, None).unwrap();
    let mut sink = doc.open_output_stream(false).unwrap();
    sink.write_all(b"hi").unwrap();
    sink.close().unwrap();

    assert_eq!(doc.length(), 2);
    assert_eq!(
        doc.open_input_stream().unwrap().read_string().unwrap(),
        "hi"
    );
    let files = root.list_files().unwrap();
    assert_eq!(files, vec![doc]);
}

#[cfg(unix)]
#[test]
fn test_link_to_outside_cannot_receive_new_files() {
    let env = TestEnvironment::new().unwrap();
    std::os::unix::fs::symlink(&env.local_root, env.granted_root.join("link")).unwrap();
    let ctx = tree_context(&env);
    let escaped = ctx
        .resolver()
        .resolve(&env.capability_uri("link/escaped.txt"), true)
        .unwrap();

    assert!(escaped.open_output_stream(false).is_none());
    assert!(!escaped.exists());
    assert!(!env.local_root.join("escaped.txt").exists());

    let link = ctx
        .resolver()
        .resolve(&env.capability_uri("link"), true)
        .unwrap();
    assert!(link.child("planted.txt", false, None).is_none());
    assert!(!env.local_root.join("planted.txt").exists());
}

#[test]
fn test_encoded_dot_segments_stay_inside_root() {
    let env = TestEnvironment::new().unwrap();
    let ctx = tree_context(&env);

    for uri in [
        "content://sandbox/%2E%2E/escaped.txt",
        "content://sandbox/%2e%2e/%2e%2e/escaped.txt",
        "content://sandbox/.%2E/escaped.txt",
        "content://sandbox/%2E/escaped.txt",
    ] {
        // Either refused outright or folded to a name inside the root
        if let Some(handle) = ctx.resolver().resolve(uri, true) {
            if let Some(mut sink) = handle.open_output_stream(false) {
                sink.write_all(b"x").unwrap();
                sink.close().unwrap();
            }
        }
        assert!(!env.root.join("escaped.txt").exists(), "{uri}");
        assert!(!env.local_root.join("escaped.txt").exists(), "{uri}");
    }
}
