use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;

use kabinetapp::media::NullMedia;
use kabinetapp::model::localized;
use kabinetapp::properties::{PropertyParams, PropertyType};
use kabinetapp::{AccessContext, CatalogStore, FsBackend, ItemDraft, ItemQuery, SortKey};

fn open(dir: &TempDir) -> CatalogStore<FsBackend> {
    CatalogStore::new(FsBackend::new(dir.path()))
}

#[test]
fn catalog_survives_reopening() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let owner = store.create_user("local").unwrap();
    let ctx = AccessContext::authenticated(owner.id);
    let coll = store
        .create_collection(localized("en", "Books"), "books", owner.id)
        .unwrap();
    store
        .define_property(coll.id, "title", PropertyParams::default().titled())
        .unwrap();
    store
        .define_property(
            coll.id,
            "rating",
            PropertyParams::default()
                .kind(PropertyType::Rating)
                .sortable(),
        )
        .unwrap();

    let mut properties = BTreeMap::new();
    properties.insert("title".to_string(), vec!["Dune".to_string()]);
    properties.insert("rating".to_string(), vec!["5".to_string()]);
    let item = store
        .create_item(
            coll.id,
            ItemDraft {
                visibility: None,
                properties,
            },
        )
        .unwrap();

    // A fresh store over the same directory sees everything.
    let reopened = open(&dir);
    let loaded = reopened.get_collection(&ctx, coll.id).unwrap();
    assert!(loaded.property("title").unwrap().is_title);
    assert_eq!(
        loaded.property("rating").unwrap().kind,
        PropertyType::Rating
    );

    let loaded_item = reopened.get_item(&ctx, coll.id, item.id).unwrap();
    assert_eq!(loaded_item.name, "Dune");
    assert_eq!(loaded_item.values["rating"], vec!["5"]);

    assert_eq!(
        reopened.get_user_by_username("local").unwrap().id,
        owner.id
    );
}

#[test]
fn on_disk_layout_and_no_tmp_leftovers() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let owner = uuid::Uuid::new_v4();
    let coll = store
        .create_collection(localized("en", "Games"), "games", owner)
        .unwrap();
    store.create_item(coll.id, ItemDraft::default()).unwrap();

    assert!(dir.path().join("collections.json").exists());
    assert!(dir.path().join(format!("items-{}.json", coll.id)).exists());

    for entry in fs::read_dir(dir.path()).unwrap() {
        let name = entry.unwrap().file_name().to_string_lossy().into_owned();
        assert!(!name.ends_with(".tmp"), "leftover tmp file: {name}");
    }
}

#[test]
fn delete_collection_removes_documents_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let coll = store
        .create_collection(localized("en", "Games"), "games", uuid::Uuid::new_v4())
        .unwrap();
    let item = store.create_item(coll.id, ItemDraft::default()).unwrap();
    store.request_loan(coll.id, item.id, "bob").unwrap();

    let items_file = dir.path().join(format!("items-{}.json", coll.id));
    let loans_file = dir.path().join(format!("loans-{}.json", coll.id));
    assert!(items_file.exists());
    assert!(loans_file.exists());

    store.delete_collection(coll.id).unwrap();
    assert!(!items_file.exists());
    assert!(!loans_file.exists());
}

#[test]
fn queries_work_against_the_fs_backend() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let owner = uuid::Uuid::new_v4();
    let ctx = AccessContext::authenticated(owner);
    let coll = store
        .create_collection(localized("en", "Books"), "books", owner)
        .unwrap();
    store
        .define_property(coll.id, "title", PropertyParams::default().titled())
        .unwrap();
    store
        .define_property(
            coll.id,
            "year",
            PropertyParams::default()
                .kind(PropertyType::Number)
                .sortable(),
        )
        .unwrap();

    for (title, year) in [("Dune", "1965"), ("Emma", "1815"), ("Hyperion", "1989")] {
        let mut properties = BTreeMap::new();
        properties.insert("title".to_string(), vec![title.to_string()]);
        properties.insert("year".to_string(), vec![year.to_string()]);
        store
            .create_item(
                coll.id,
                ItemDraft {
                    visibility: None,
                    properties,
                },
            )
            .unwrap();
    }

    let mut query = ItemQuery {
        sort: vec![SortKey::desc("year")],
        ..Default::default()
    };
    query.filters.insert("year".to_string(), ">1900".to_string());

    let page = store.dump_items(&ctx, coll.id, &query, &NullMedia).unwrap();
    let names: Vec<&str> = page.items.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Hyperion", "Dune"]);
    assert_eq!(page.total, 2);
}
