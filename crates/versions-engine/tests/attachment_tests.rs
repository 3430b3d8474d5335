//! Shared attachments across forks

mod common;

use common::{count, pages, setup, versions, Fixture, InPlacePolicy, LetterPolicy};
use versions_core::model::Value;
use versions_core::{attrs, ExErrorKind};
use versions_engine::{HasMultiple, Version, Versioned};
use versions_store::attachments::{AttachmentStore, Upload};

fn upload(content: &str) -> Upload {
    Upload::new("notes.txt", content.as_bytes().to_vec())
}

/// Store whose root is a regular file, so every file operation fails
fn unwritable_store(fx: &Fixture) -> AttachmentStore {
    let root = fx.dir.path().join("blocked");
    std::fs::write(&root, "not a directory").unwrap();
    AttachmentStore::open(&fx.tx, root).unwrap()
}

#[test]
fn test_file_is_written_after_commit() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("hello")).unwrap();

    fx.tx.begin().unwrap();
    assert!(versions.save(&fx.tx, &mut version).unwrap());
    let path = versions.file_path(&fx.tx, &version).unwrap().unwrap();
    assert!(!path.exists());
    fx.tx.commit().unwrap();

    assert!(path.exists());
    assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    assert!(path.to_string_lossy().ends_with("-notes.txt"));
}

#[test]
fn test_pending_file_is_readable_before_save() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::new();
    versions.set_file(&mut version, upload("draft")).unwrap();

    assert!(version.has_pending_file());
    assert!(version.is_changed());
    assert_eq!(versions.file_path(&fx.tx, &version).unwrap(), None);
    assert_eq!(versions.read_file(&fx.tx, &version).unwrap(), Some(b"draft".to_vec()));
}

#[test]
fn test_rolled_back_save_leaves_no_file() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("gone")).unwrap();

    fx.tx.begin().unwrap();
    assert!(versions.save(&fx.tx, &mut version).unwrap());
    let path = versions.file_path(&fx.tx, &version).unwrap().unwrap();
    fx.tx.rollback().unwrap();

    assert!(!path.exists());
    assert_eq!(count(&fx.tx, "attachments"), 0);
}

#[test]
fn test_failed_save_keeps_the_staged_file() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "Fly" });
    versions.set_file(&mut version, upload("staged")).unwrap();

    assert!(!versions.save(&fx.tx, &mut version).unwrap());

    assert!(version.has_pending_file());
    assert_eq!(count(&fx.tx, "attachments"), 0);
    assert_eq!(versions.read_file(&fx.tx, &version).unwrap(), Some(b"staged".to_vec()));
}

#[test]
fn test_fork_shares_the_file() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("shared")).unwrap();
    versions.save(&fx.tx, &mut version).unwrap();
    let first_path = versions.file_path(&fx.tx, &version).unwrap();

    version.set("title", "Two");
    assert!(versions.save(&fx.tx, &mut version).unwrap());

    assert!(version.was_cloned());
    assert_eq!(versions.file_path(&fx.tx, &version).unwrap(), first_path);
    assert_eq!(fx.store.count(&fx.tx).unwrap(), 1);
}

#[test]
fn test_new_file_on_fork_keeps_the_old_one() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("first")).unwrap();
    versions.save(&fx.tx, &mut version).unwrap();
    let first_id = version.id().unwrap();
    let first_path = versions.file_path(&fx.tx, &version).unwrap().unwrap();

    versions.set_file(&mut version, upload("second")).unwrap();
    assert!(versions.save(&fx.tx, &mut version).unwrap());

    let second_path = versions.file_path(&fx.tx, &version).unwrap().unwrap();
    assert_ne!(second_path, first_path);
    assert!(first_path.exists());
    assert_eq!(std::fs::read(&second_path).unwrap(), b"second");

    let original = versions.get(&fx.tx, first_id).unwrap();
    assert_eq!(versions.file_path(&fx.tx, &original).unwrap(), Some(first_path));
    assert_eq!(fx.store.count(&fx.tx).unwrap(), 2);
}

#[test]
fn test_in_place_file_replace_removes_old_file() {
    let fx = setup();
    let versions = Versioned::builder("versions")
        .policy(InPlacePolicy)
        .attachments(fx.store.clone())
        .build(&fx.tx)
        .unwrap();
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("old")).unwrap();
    versions.save(&fx.tx, &mut version).unwrap();
    let old_path = versions.file_path(&fx.tx, &version).unwrap().unwrap();
    assert!(old_path.exists());

    versions.set_file(&mut version, upload("new")).unwrap();
    assert!(versions.save(&fx.tx, &mut version).unwrap());

    let new_path = versions.file_path(&fx.tx, &version).unwrap().unwrap();
    assert!(!old_path.exists());
    assert!(new_path.exists());
    assert_eq!(fx.store.count(&fx.tx).unwrap(), 1);
    assert_eq!(count(&fx.tx, "versions"), 1);
}

#[test]
fn test_shared_file_outlives_one_destroyed_version() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("shared")).unwrap();
    versions.save(&fx.tx, &mut version).unwrap();
    let first_id = version.id().unwrap();
    version.set("title", "Two");
    versions.save(&fx.tx, &mut version).unwrap();
    let path = versions.file_path(&fx.tx, &version).unwrap().unwrap();

    assert!(versions.destroy(&fx.tx, &mut version).unwrap());
    assert!(path.exists());
    assert_eq!(fx.store.count(&fx.tx).unwrap(), 1);

    let mut first = versions.get(&fx.tx, first_id).unwrap();
    assert!(versions.destroy(&fx.tx, &mut first).unwrap());
    assert!(!path.exists());
    assert_eq!(fx.store.count(&fx.tx).unwrap(), 0);
}

#[test]
fn test_rolled_back_destroy_keeps_file() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("kept")).unwrap();
    versions.save(&fx.tx, &mut version).unwrap();
    let path = versions.file_path(&fx.tx, &version).unwrap().unwrap();

    fx.tx.begin().unwrap();
    assert!(versions.destroy(&fx.tx, &mut version).unwrap());
    fx.tx.rollback().unwrap();

    assert!(path.exists());
    assert_eq!(fx.store.count(&fx.tx).unwrap(), 1);
}

#[test]
fn test_owner_update_without_file_reuses_path() {
    let fx = setup();
    let pages = pages(&fx);
    let mut page = pages.new_owner();
    pages
        .set_version_attributes(&fx.tx, &mut page, attrs! { "title" => "One" })
        .unwrap();
    pages.set_file(&fx.tx, &mut page, upload("body")).unwrap();
    assert!(pages.save(&fx.tx, &mut page).unwrap());
    let first_path = pages.file_path(&fx.tx, &mut page).unwrap();
    assert!(first_path.is_some());

    pages
        .update_version(&fx.tx, &mut page, attrs! { "title" => "Two" })
        .unwrap();

    assert_eq!(pages.version(&fx.tx, &mut page).unwrap().number(), Some(2));
    assert_eq!(pages.file_path(&fx.tx, &mut page).unwrap(), first_path);
}

#[test]
fn test_owner_file_update_creates_new_path() {
    let fx = setup();
    let pages = pages(&fx);
    let mut page = pages
        .create(&fx.tx, attrs! {}, attrs! { "title" => "One" })
        .unwrap();
    pages.set_file(&fx.tx, &mut page, upload("v1")).unwrap();
    assert!(pages.save(&fx.tx, &mut page).unwrap());
    let first_path = pages.file_path(&fx.tx, &mut page).unwrap().unwrap();

    pages.set_file(&fx.tx, &mut page, upload("v2")).unwrap();
    assert!(pages.save(&fx.tx, &mut page).unwrap());

    let second_path = pages.file_path(&fx.tx, &mut page).unwrap().unwrap();
    assert_ne!(first_path, second_path);
    assert_eq!(pages.read_file(&fx.tx, &mut page).unwrap(), Some(b"v2".to_vec()));
    assert!(first_path.exists());
}

#[test]
fn test_unsafe_filename_is_sanitised() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::new();
    versions
        .set_file(&mut version, Upload::new("my report (final).pdf", b"%PDF".to_vec()))
        .unwrap();
    versions.save(&fx.tx, &mut version).unwrap();

    let path = versions.file_path(&fx.tx, &version).unwrap().unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with("-myreportfinal.pdf"), "{}", name);
    assert!(path.exists());
}

#[test]
fn test_attachment_id_is_recorded_on_the_row() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::new();
    versions.set_file(&mut version, upload("x")).unwrap();
    versions.save(&fx.tx, &mut version).unwrap();

    let stored = versions.get(&fx.tx, version.id().unwrap()).unwrap();
    assert_eq!(stored.attachment_id(), version.attachment_id());
    assert_ne!(stored.get("attachment_id"), &Value::Null);
}

#[test]
fn test_files_need_a_configured_store() {
    let fx = setup();
    let versions = Versioned::builder("versions").build(&fx.tx).unwrap();
    let mut version = Version::new();

    let err = versions.set_file(&mut version, upload("nope")).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
}

#[test]
fn test_failed_file_write_keeps_the_committed_version() {
    let fx = setup();
    let versions = Versioned::builder("versions")
        .policy(LetterPolicy)
        .attachments(unwritable_store(&fx))
        .build(&fx.tx)
        .unwrap();
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("lost")).unwrap();

    let err = versions.save(&fx.tx, &mut version).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::DeferredActionFailed);
    assert!(!version.is_new_record());
    assert!(!version.has_pending_file());
    assert_eq!(version.number(), Some(1));
    assert_eq!(count(&fx.tx, "versions"), 1);

    assert!(versions.save(&fx.tx, &mut version).unwrap());
    assert_eq!(count(&fx.tx, "versions"), 1);
    assert_eq!(count(&fx.tx, "attachments"), 1);
}

#[test]
fn test_failed_file_removal_still_marks_version_destroyed() {
    let fx = setup();
    let versions = versions(&fx);
    let mut version = Version::with_attributes(attrs! { "title" => "One" });
    versions.set_file(&mut version, upload("stuck")).unwrap();
    versions.save(&fx.tx, &mut version).unwrap();

    let blocked = Versioned::builder("versions")
        .policy(LetterPolicy)
        .attachments(unwritable_store(&fx))
        .build(&fx.tx)
        .unwrap();
    let err = blocked.destroy(&fx.tx, &mut version).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::DeferredActionFailed);
    assert!(version.is_destroyed());
    assert_eq!(count(&fx.tx, "versions"), 0);
    assert_eq!(count(&fx.tx, "attachments"), 0);
}

#[test]
fn test_owner_save_with_failed_file_write_is_not_repeated() {
    let fx = setup();
    let pages = HasMultiple::builder("versions")
        .owner_table("pages")
        .policy(LetterPolicy)
        .attachments(unwritable_store(&fx))
        .build(&fx.tx)
        .unwrap();
    let mut page = pages.new_owner();
    pages
        .set_version_attributes(&fx.tx, &mut page, attrs! { "title" => "One" })
        .unwrap();
    pages.set_file(&fx.tx, &mut page, upload("lost")).unwrap();

    let err = pages.save(&fx.tx, &mut page).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::DeferredActionFailed);
    assert!(!page.is_new_record());
    assert_eq!(count(&fx.tx, "pages"), 1);
    assert_eq!(count(&fx.tx, "versions"), 1);
    let page_id = page.id().unwrap();
    let version_id = pages.version(&fx.tx, &mut page).unwrap().id().unwrap();
    let pointer: i64 = fx
        .tx
        .connection()
        .query_row("SELECT version_id FROM pages WHERE id = ?", [page_id.get()], |r| r.get(0))
        .unwrap();
    assert_eq!(pointer, version_id.get());

    assert!(pages.save(&fx.tx, &mut page).unwrap());
    assert_eq!(count(&fx.tx, "pages"), 1);
    assert_eq!(count(&fx.tx, "versions"), 1);
}
