//! Integration tests: document changes → trigger router → rebuilds → cache documents.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use document_store::{
    Document, DocumentQuery, DocumentRef, DocumentStore, DocumentStoreExt, InMemoryDocumentStore,
    Order, Predicate, SetOptions, StoreError,
};
use serde_json::{Map, Value, json};
use view_engine::{
    AddSource, ChangeTest, Classification, EngineConfig, Generation, RebuildPhase, ReportStatus,
    Resolver, Source, SummarySource, ViewDefinition, ViewEngine, ViewError,
};

/// Store wrapper whose reads of one collection, or whose n-th write, fail.
struct FailingStore {
    inner: InMemoryDocumentStore,
    broken_collection: &'static str,
    reads_broken: AtomicBool,
    broken_write: AtomicUsize,
    writes: AtomicUsize,
}

impl FailingStore {
    /// Reads of `broken_collection` fail from the start.
    fn new(inner: InMemoryDocumentStore, broken_collection: &'static str) -> Self {
        let store = Self::healthy(inner, broken_collection);
        store.break_reads();
        store
    }

    /// Nothing fails until `break_reads` or `break_writes` is called.
    fn healthy(inner: InMemoryDocumentStore, broken_collection: &'static str) -> Self {
        Self {
            inner,
            broken_collection,
            reads_broken: AtomicBool::new(false),
            broken_write: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    fn break_reads(&self) {
        self.reads_broken.store(true, Ordering::SeqCst);
    }

    /// Fails the `n`-th `set` from now on.
    fn break_writes(&self, n: usize) {
        self.writes.store(0, Ordering::SeqCst);
        self.broken_write.store(n, Ordering::SeqCst);
    }

    fn check(&self, collection: &str) -> document_store::Result<()> {
        if self.reads_broken.load(Ordering::SeqCst) && collection == self.broken_collection {
            return Err(StoreError::Unavailable(format!("{collection} is offline")));
        }
        Ok(())
    }

    fn check_write(&self, collection: &str, id: &str) -> document_store::Result<()> {
        let broken = self.broken_write.load(Ordering::SeqCst);
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if broken != 0 && n == broken {
            return Err(StoreError::Unavailable(format!("write of {collection}/{id} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn query(&self, query: &DocumentQuery) -> document_store::Result<Vec<Document>> {
        self.check(&query.collection)?;
        self.inner.query(query).await
    }

    async fn get(&self, collection: &str, id: &str) -> document_store::Result<Option<Document>> {
        self.check(collection)?;
        self.inner.get(collection, id).await
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        value: Map<String, Value>,
        options: SetOptions,
    ) -> document_store::Result<()> {
        self.check_write(collection, id)?;
        self.inner.set(collection, id, value, options).await
    }

    async fn delete(&self, collection: &str, id: &str) -> document_store::Result<()> {
        self.inner.delete(collection, id).await
    }

    async fn list_documents(&self, collection: &str) -> document_store::Result<Vec<DocumentRef>> {
        self.inner.list_documents(collection).await
    }
}

fn approved_assets() -> ViewDefinition {
    ViewDefinition::new(
        "approvedAssets",
        Source::collection("assets")
            .matching(Predicate::equals("isApproved", true))
            .order_by(Order::asc("title"))
            .test_with(|before, after| before.get("title") != after.get("title")),
    )
}

fn config(page_size: usize) -> EngineConfig {
    EngineConfig::new(page_size, "viewCache").unwrap()
}

async fn seed_assets(store: &InMemoryDocumentStore, n: usize) {
    for i in 0..n {
        store
            .put(
                "assets",
                &format!("a{i:03}"),
                json!({"title": format!("asset {i:03}"), "isApproved": true}),
            )
            .await
            .unwrap();
    }
}

async fn page_items(engine: &ViewEngine<Arc<InMemoryDocumentStore>>, view: &str, n: usize) -> Vec<Value> {
    engine
        .read_page(view, n)
        .await
        .unwrap()
        .and_then(|doc| doc.get("items").and_then(Value::as_array).cloned())
        .unwrap_or_default()
}

async fn page_count(engine: &ViewEngine<Arc<InMemoryDocumentStore>>, view: &str) -> u64 {
    engine
        .read_summary(view)
        .await
        .unwrap()
        .and_then(|doc| doc.get("pageCount").and_then(Value::as_u64))
        .unwrap_or_default()
}

fn asset(id: &str, value: Value) -> Document {
    Document::from_value("assets", id, value)
}

#[tokio::test]
async fn test_classification_table_through_engine() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let engine = ViewEngine::new(store, config(20), vec![approved_assets()]).unwrap();

    let classification = |report: view_engine::TriggerReport| report.views[0].classification;

    let approved = asset("a1", json!({"isApproved": true, "title": "old"}));
    let unapproved = asset("a1", json!({"isApproved": false, "title": "old"}));
    let retitled = asset("a1", json!({"isApproved": true, "title": "new"}));

    assert_eq!(
        classification(engine.on_update(unapproved.clone(), approved.clone()).await),
        Classification::Add
    );
    assert_eq!(
        classification(engine.on_update(approved.clone(), unapproved.clone()).await),
        Classification::Remove
    );
    assert_eq!(
        classification(
            engine
                .on_update(unapproved.clone(), asset("a1", json!({"isApproved": false, "title": "x"})))
                .await
        ),
        Classification::Ignore
    );
    assert_eq!(
        classification(engine.on_update(approved.clone(), retitled).await),
        Classification::Update
    );
    assert_eq!(
        classification(engine.on_update(approved.clone(), approved.clone()).await),
        Classification::Ignore
    );
    assert_eq!(
        classification(engine.on_delete(approved).await),
        Classification::Remove
    );
}

#[tokio::test]
async fn test_pagination_boundary() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 20).await;
    let engine = ViewEngine::new(Arc::clone(&store), config(20), vec![approved_assets()]).unwrap();

    engine.rebuild_view("approvedAssets").await.unwrap();
    assert_eq!(page_count(&engine, "approvedAssets").await, 1);
    assert_eq!(page_items(&engine, "approvedAssets", 1).await.len(), 20);

    store
        .put("assets", "a020", json!({"title": "asset 020", "isApproved": true}))
        .await
        .unwrap();
    let report = engine
        .on_create(asset("a020", json!({"title": "asset 020", "isApproved": true})))
        .await;
    assert_eq!(report.rebuilt_views(), vec!["approvedAssets"]);

    assert_eq!(page_count(&engine, "approvedAssets").await, 2);
    assert_eq!(page_items(&engine, "approvedAssets", 1).await.len(), 20);
    let last = page_items(&engine, "approvedAssets", 2).await;
    assert_eq!(last.len(), 1);
    assert_eq!(last[0]["id"], json!("a020"));
}

#[tokio::test]
async fn test_pages_concatenate_to_direct_resolution() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 23).await;
    store
        .put("assets", "hidden", json!({"title": "aaa", "isApproved": false}))
        .await
        .unwrap();
    let view = approved_assets();
    let direct = Resolver::new(store.as_ref(), "approvedAssets")
        .resolve(&view.source)
        .await
        .unwrap();

    let engine = ViewEngine::new(Arc::clone(&store), config(5), vec![view]).unwrap();
    engine.rebuild_view("approvedAssets").await.unwrap();

    let pages = page_count(&engine, "approvedAssets").await;
    assert_eq!(pages, 5);
    let mut cached = Vec::new();
    for n in 1..=pages as usize {
        cached.extend(page_items(&engine, "approvedAssets", n).await);
    }
    let expected: Vec<Value> = direct.iter().map(|item| item.to_value()).collect();
    assert_eq!(cached, expected);
    assert!(cached.iter().all(|item| item["id"] != json!("hidden")));
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 7).await;
    let view = approved_assets().summary(SummarySource::new(
        "titles",
        Source::collection("assets").fields(["title"]),
    ));
    let engine = ViewEngine::new(Arc::clone(&store), config(3), vec![view]).unwrap();

    let snapshot = |store: Arc<InMemoryDocumentStore>| async move {
        let mut docs = Vec::new();
        for reference in store.list_documents("viewCache").await.unwrap() {
            let doc = store.get("viewCache", reference.id()).await.unwrap().unwrap();
            docs.push((reference, serde_json::to_string(doc.data()).unwrap()));
        }
        docs
    };

    engine.rebuild_view("approvedAssets").await.unwrap();
    let first = snapshot(Arc::clone(&store)).await;
    engine.rebuild_view("approvedAssets").await.unwrap();
    let second = snapshot(Arc::clone(&store)).await;

    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_join_target_yields_no_joined_fields() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 2).await;
    store
        .put("assetStats", "a000", json!({"downloads": 5}))
        .await
        .unwrap();
    let view = ViewDefinition::new(
        "withStats",
        Source::collection("assets")
            .order_by(Order::asc("title"))
            .fields(["title"])
            .join(Source::collection("assetStats")),
    );
    let engine = ViewEngine::new(Arc::clone(&store), config(20), vec![view]).unwrap();
    engine.rebuild_view("withStats").await.unwrap();

    let items = page_items(&engine, "withStats", 1).await;
    assert_eq!(items[0]["downloads"], json!(5));
    assert_eq!(
        items[1],
        json!({"id": "a001", "ref": {"$ref": "assets/a001"}, "title": "asset 001"})
    );
}

#[tokio::test]
async fn test_add_fanout_rows_share_id() {
    let store = Arc::new(InMemoryDocumentStore::new());
    store
        .put("assets", "a1", json!({"tags": ["red", "green", "blue"]}))
        .await
        .unwrap();
    let view = ViewDefinition::new(
        "assetTags",
        Source::collection("assets").map(|doc, _index, _ctx, sink| {
            for tag in doc.get("tags").and_then(Value::as_array).into_iter().flatten() {
                let mut fields = Map::new();
                fields.insert("tag".to_string(), tag.clone());
                sink.add_unmapped_item(fields);
            }
            None
        }),
    );
    let engine = ViewEngine::new(Arc::clone(&store), config(20), vec![view]).unwrap();
    engine.rebuild_view("assetTags").await.unwrap();

    let items = page_items(&engine, "assetTags", 1).await;
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item["id"] == json!("a1")));
    let tags: Vec<_> = items.iter().map(|item| item["tag"].clone()).collect();
    assert_eq!(tags, vec![json!("red"), json!("green"), json!("blue")]);
}

#[tokio::test]
async fn test_shrinking_view_deletes_stale_pages() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 6).await;
    let engine = ViewEngine::new(Arc::clone(&store), config(2), vec![approved_assets()]).unwrap();
    engine.rebuild_view("approvedAssets").await.unwrap();
    assert_eq!(page_count(&engine, "approvedAssets").await, 3);

    for id in ["a000", "a001", "a002"] {
        let before = store.get("assets", id).await.unwrap().unwrap();
        store.delete("assets", id).await.unwrap();
        engine.on_delete(before).await;
    }

    assert_eq!(page_count(&engine, "approvedAssets").await, 2);
    assert!(engine.read_page("approvedAssets", 3).await.unwrap().is_none());
}

#[tokio::test]
async fn test_nested_source_change_rebuilds_parent_view() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 1).await;
    let view = ViewDefinition::new(
        "withComments",
        Source::collection("assets").add(
            "comments",
            AddSource::by_id("assetId", Source::collection("comments").fields(["body"])),
        ),
    );
    let engine = ViewEngine::new(Arc::clone(&store), config(20), vec![view]).unwrap();
    engine.rebuild_view("withComments").await.unwrap();
    assert_eq!(page_items(&engine, "withComments", 1).await[0]["comments"], json!([]));

    store
        .put("comments", "c1", json!({"assetId": "a000", "body": "hi"}))
        .await
        .unwrap();
    let report = engine
        .on_create(Document::from_value(
            "comments",
            "c1",
            json!({"assetId": "a000", "body": "hi"}),
        ))
        .await;
    assert_eq!(report.views[0].classification, Classification::Update);

    let comments = &page_items(&engine, "withComments", 1).await[0]["comments"];
    assert_eq!(comments[0]["body"], json!("hi"));
}

#[tokio::test]
async fn test_failure_in_one_view_does_not_block_others() {
    let inner = InMemoryDocumentStore::new();
    let created = json!({"isApproved": true, "title": "t", "owner": "u1"});
    inner.put("assets", "a1", created.clone()).await.unwrap();
    let store = Arc::new(FailingStore::new(inner, "users"));
    let views = vec![
        approved_assets(),
        ViewDefinition::new(
            "withOwners",
            Source::collection("assets").merge("owner", Source::collection("users")),
        ),
    ];
    let engine = ViewEngine::new(store, config(20), views).unwrap();

    let report = engine.on_create(asset("a1", created)).await;
    assert_eq!(report.rebuilt_views(), vec!["approvedAssets", "withOwners"]);

    let outcome = |name: &str| {
        report
            .views
            .iter()
            .find(|v| v.view == name)
            .and_then(|v| v.rebuild.clone())
            .unwrap()
    };
    assert_eq!(outcome("approvedAssets").status, ReportStatus::Ok);
    let failed = outcome("withOwners");
    assert_eq!(failed.status, ReportStatus::Error);
    assert!(failed.error.unwrap().contains("withOwners"));

    let status = engine.status("withOwners").await.unwrap();
    assert_eq!(status.phase, view_engine::RebuildPhase::Failed);
    assert!(engine.read_page("approvedAssets", 1).await.unwrap().is_some());
    assert!(engine.read_summary("withOwners").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rebuild_all_reports_failures_per_view() {
    let store = Arc::new(FailingStore::new(InMemoryDocumentStore::new(), "users"));
    let views = vec![
        approved_assets(),
        ViewDefinition::new("users", Source::collection("users")),
    ];
    let engine = ViewEngine::new(store, config(20), views).unwrap();

    let report = engine.rebuild_all().await;
    assert_eq!(report.view_names, vec!["approvedAssets", "users"]);
    assert_eq!(report.views["approvedAssets"].status, ReportStatus::Ok);
    assert_eq!(report.views["users"].status, ReportStatus::Error);
}

#[tokio::test]
async fn test_concurrent_rebuilds_commit_newest_generation() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 30).await;
    let engine = Arc::new(
        ViewEngine::new(Arc::clone(&store), config(4), vec![approved_assets()]).unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.rebuild_view("approvedAssets").await.unwrap() })
        })
        .collect();
    let mut committed = Vec::new();
    for handle in handles {
        if let view_engine::RebuildOutcome::Committed { generation, .. } = handle.await.unwrap() {
            committed.push(generation);
        }
    }

    let status = engine.status("approvedAssets").await.unwrap();
    assert_eq!(status.requested, view_engine::Generation(8));
    assert!(committed.contains(&status.committed));
    assert_eq!(status.committed, committed.iter().copied().max().unwrap());
    assert_eq!(page_count(&engine, "approvedAssets").await, 8);
}

#[tokio::test]
async fn test_item_keyed_view_writes_one_document_per_id() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_assets(&store, 3).await;
    let view = ViewDefinition::new(
        "assetsById",
        Source::collection("assets").test(ChangeTest::BasicEquality),
    )
    .keyed_by_item_id();
    let engine = ViewEngine::new(Arc::clone(&store), config(2), vec![view]).unwrap();
    engine.rebuild_view("assetsById").await.unwrap();

    assert_eq!(page_count(&engine, "assetsById").await, 3);
    let doc = engine.read_item("assetsById", "a001").await.unwrap().unwrap();
    assert_eq!(doc.get("items").unwrap()[0]["title"], json!("asset 001"));
    assert!(engine.read_page("assetsById", 1).await.unwrap().is_none());
}

async fn cache_snapshot(store: &InMemoryDocumentStore) -> Vec<(String, String)> {
    let mut docs = Vec::new();
    for reference in store.list_documents("viewCache").await.unwrap() {
        let doc = store.get("viewCache", reference.id()).await.unwrap().unwrap();
        docs.push((reference.id().to_string(), serde_json::to_string(doc.data()).unwrap()));
    }
    docs
}

async fn page_items_of(store: &InMemoryDocumentStore, key: &str) -> Vec<Value> {
    store
        .get("viewCache", key)
        .await
        .unwrap()
        .and_then(|doc| doc.get("items").and_then(Value::as_array).cloned())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_failed_rebuild_keeps_last_good_cache() {
    let store = Arc::new(FailingStore::healthy(InMemoryDocumentStore::new(), "assets"));
    seed_assets(&store.inner, 3).await;
    let engine = ViewEngine::new(Arc::clone(&store), config(2), vec![approved_assets()]).unwrap();
    engine.rebuild_view("approvedAssets").await.unwrap();
    let good = cache_snapshot(&store.inner).await;
    assert_eq!(good.len(), 3);

    let created = json!({"title": "aaa", "isApproved": true});
    store.inner.put("assets", "new", created.clone()).await.unwrap();
    store.break_reads();
    let report = engine.on_create(asset("new", created)).await;

    let rebuild = report.views[0].rebuild.clone().unwrap();
    assert_eq!(rebuild.status, ReportStatus::Error);
    assert_eq!(cache_snapshot(&store.inner).await, good);

    let status = engine.status("approvedAssets").await.unwrap();
    assert_eq!(status.phase, RebuildPhase::Failed);
    assert_eq!(status.committed, Generation(1));
}

#[tokio::test]
async fn test_write_failure_mid_pass_reports_write_error() {
    let store = Arc::new(FailingStore::healthy(InMemoryDocumentStore::new(), "assets"));
    seed_assets(&store.inner, 3).await;
    let engine = ViewEngine::new(Arc::clone(&store), config(2), vec![approved_assets()]).unwrap();
    engine.rebuild_view("approvedAssets").await.unwrap();
    let old_summary = engine.read_summary("approvedAssets").await.unwrap().unwrap();
    assert_eq!(old_summary.get("pageCount"), Some(&json!(2)));

    for id in ["aaa0", "aaa1"] {
        store
            .inner
            .put("assets", id, json!({"title": id, "isApproved": true}))
            .await
            .unwrap();
    }
    store.break_writes(2);
    let result = engine.rebuild_view("approvedAssets").await;

    match result {
        Err(ViewError::Write { view, .. }) => assert_eq!(view, "approvedAssets"),
        other => panic!("expected write error, got {other:?}"),
    }
    let first = page_items_of(&store.inner, "approvedAssets_page1").await;
    let ids: Vec<_> = first.iter().map(|item| item["id"].clone()).collect();
    assert_eq!(ids, vec![json!("aaa0"), json!("aaa1")]);

    let summary = engine.read_summary("approvedAssets").await.unwrap().unwrap();
    assert_eq!(summary.data(), old_summary.data());
    assert!(!store.inner.exists("viewCache", "approvedAssets_page3").await.unwrap());
}
