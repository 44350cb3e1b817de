use super::*;
use crate::models::channel_id;
use crate::services::parser::ParseMode;
use crate::services::reconciler::ReconcileMode;
use crate::store::InMemoryStore;
use async_stream::stream;
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Local upstream
// ============================================================================

#[derive(Default)]
struct Upstream {
    m3u: Mutex<String>,
    /// Second half of `/slow.m3u`, sent once `release` is notified
    tail: Mutex<String>,
    release: Notify,
    hits: AtomicUsize,
}

impl Upstream {
    fn set_m3u(&self, body: &str) {
        *self.m3u.lock().unwrap() = body.to_string();
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn list_m3u(State(up): State<Arc<Upstream>>) -> String {
    up.hits.fetch_add(1, Ordering::SeqCst);
    up.m3u.lock().unwrap().clone()
}

async fn slow_m3u(State(up): State<Arc<Upstream>>) -> Response {
    up.hits.fetch_add(1, Ordering::SeqCst);
    let head = up.m3u.lock().unwrap().clone();
    let tail = up.tail.lock().unwrap().clone();

    let body = stream! {
        yield Ok::<Bytes, std::io::Error>(Bytes::from(head));
        up.release.notified().await;
        yield Ok(Bytes::from(tail));
    };
    Body::from_stream(body).into_response()
}

async fn broken_m3u(State(up): State<Arc<Upstream>>) -> Response {
    up.hits.fetch_add(1, Ordering::SeqCst);
    let head = up.m3u.lock().unwrap().clone();

    let body = stream! {
        yield Ok::<Bytes, std::io::Error>(Bytes::from(head));
        tokio::time::sleep(Duration::from_millis(20)).await;
        yield Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "upstream died"));
    };
    Body::from_stream(body).into_response()
}

#[derive(Deserialize)]
struct ApiQuery {
    username: String,
    password: String,
    action: Option<String>,
}

async fn player_api(State(up): State<Arc<Upstream>>, Query(q): Query<ApiQuery>) -> Response {
    up.hits.fetch_add(1, Ordering::SeqCst);

    if q.username != "u" || q.password != "p" {
        return Json(json!({"user_info": {"username": q.username, "status": "Disabled"}})).into_response();
    }

    match q.action.as_deref() {
        None => Json(json!({
            "user_info": {"username": "u", "status": "Active", "allowed_output_formats": ["m3u8", "ts"]},
            "server_info": {"url": "127.0.0.1", "port": "80"}
        }))
        .into_response(),
        Some("get_live_categories") => Json(json!([{"category_id": "1", "category_name": "News"}])).into_response(),
        Some("get_live_streams") => Json(json!([
            {"name": "CNN", "stream_id": 1, "category_id": "1", "epg_channel_id": "cnn.us", "stream_icon": "http://x/cnn.png"},
            {"name": "No id"}
        ]))
        .into_response(),
        Some("get_vod_categories") => Json(json!([{"category_id": 2, "category_name": "Movies"}])).into_response(),
        Some("get_vod_streams") => Json(json!([
            {"name": "Alien", "stream_id": "7", "category_id": "2", "container_extension": "mkv"}
        ]))
        .into_response(),
        Some("get_series_categories") => String::new().into_response(),
        Some("get_series") => Json(json!([
            {"series_id": 3, "name": "Dark", "cover": "http://x/dark.jpg", "category_id": "9"}
        ]))
        .into_response(),
        Some(_) => Json(json!([])).into_response(),
    }
}

async fn spawn_upstream() -> (String, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let app = Router::new()
        .route("/list.m3u", get(list_m3u))
        .route("/slow.m3u", get(slow_m3u))
        .route("/broken.m3u", get(broken_m3u))
        .route("/player_api.php", get(player_api))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), upstream)
}

// ============================================================================
// Helpers
// ============================================================================

fn test_config() -> SyncConfig {
    SyncConfig {
        fetch_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(5),
        read_line_timeout: Duration::from_secs(5),
        batch_size: 3,
        ..Default::default()
    }
}

fn engine_with(config: SyncConfig) -> (SyncEngine, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let engine = SyncEngine::new(store.clone(), config).unwrap();
    (engine, store)
}

async fn last(progress: ProgressStream) -> Process<()> {
    let mut items: Vec<Process<()>> = progress.collect().await;
    items.pop().expect("progress stream is never empty")
}

fn m3u(entries: &[(&str, &str)]) -> String {
    let mut body = String::from("#EXTM3U\n");
    for (title, url) in entries {
        body.push_str(&format!("#EXTINF:-1 group-title=\"Group\",{}\n{}\n", title, url));
    }
    body
}

fn url_set(channels: &[Channel]) -> HashSet<String> {
    channels.iter().map(|c| c.url.clone()).collect()
}

fn failure_message(process: Process<()>) -> String {
    match process {
        Process::Failure { message } => message,
        other => panic!("expected failure, got {:?}", other),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_subscribe_imports_m3u() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u("#EXTM3U\n#EXTINF:-1 tvg-logo=\"http://x/a.png\" group-title=\"Sports\",ESPN\nhttp://x/espn.m3u8\n");
    let (engine, store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);

    let outcome = last(engine.subscribe("My list", &url, SyncStrategy::All).await).await;
    assert_eq!(outcome, Process::success());

    let channels = engine.channels(&url).await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].title, "ESPN");
    assert_eq!(channels[0].category, "Sports");
    assert_eq!(channels[0].cover.as_deref(), Some("http://x/a.png"));
    assert_eq!(channels[0].url, "http://x/espn.m3u8");

    let playlist = store.get_playlist(&url).await.unwrap().unwrap();
    assert_eq!(playlist.source, DataSource::M3u);
    assert!(playlist.synced_at.is_some());
}

#[tokio::test]
async fn test_keep_resync_is_idempotent() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a"), ("B", "http://x/b")]));
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);

    assert_eq!(last(engine.subscribe("L", &url, SyncStrategy::Keep).await).await, Process::success());

    let patch = ChannelPatch {
        favourite: Some(true),
        hidden: Some(true),
        seen: Some(1_700_000_000_000),
    };
    engine.update_channel(&channel_id(&url, "http://x/a"), &patch).await.unwrap();
    let before = engine.channels(&url).await.unwrap();

    assert_eq!(last(engine.refresh(&url, SyncStrategy::Keep).await).await, Process::success());
    let after = engine.channels(&url).await.unwrap();

    assert_eq!(before, after);
    assert_eq!(upstream.hits(), 2);
}

#[tokio::test]
async fn test_all_strategy_converges() {
    for mode in [ReconcileMode::Streaming, ReconcileMode::Deferred] {
        let (base, upstream) = spawn_upstream().await;
        let config = SyncConfig {
            reconcile_mode: mode,
            ..test_config()
        };
        let (engine, _store) = engine_with(config);
        let url = format!("{}/list.m3u", base);

        upstream.set_m3u(&m3u(&[("A", "http://x/a"), ("B", "http://x/b"), ("C", "http://x/c")]));
        assert_eq!(last(engine.subscribe("L", &url, SyncStrategy::All).await).await, Process::success());

        let patch = ChannelPatch {
            favourite: Some(true),
            seen: Some(42),
            ..Default::default()
        };
        engine.update_channel(&channel_id(&url, "http://x/b"), &patch).await.unwrap();

        let s2 = [("B renamed", "http://x/b"), ("D", "http://x/d")];
        upstream.set_m3u(&m3u(&s2));
        assert_eq!(last(engine.refresh(&url, SyncStrategy::All).await).await, Process::success());

        let channels = engine.channels(&url).await.unwrap();
        let expected: HashSet<String> = s2.iter().map(|(_, u)| u.to_string()).collect();
        assert_eq!(url_set(&channels), expected);

        let b = channels.iter().find(|c| c.url == "http://x/b").unwrap();
        assert_eq!(b.title, "B renamed");
        assert!(b.favourite);
        assert_eq!(b.seen, 42);
    }
}

#[tokio::test]
async fn test_refresh_strategy_applies_to_run_only() {
    let (base, upstream) = spawn_upstream().await;
    let (engine, store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);

    upstream.set_m3u(&m3u(&[("A", "http://x/a")]));
    last(engine.subscribe("L", &url, SyncStrategy::All).await).await;

    upstream.set_m3u(&m3u(&[("B", "http://x/b")]));
    assert_eq!(last(engine.refresh(&url, SyncStrategy::Keep).await).await, Process::success());

    assert_eq!(engine.channels(&url).await.unwrap().len(), 2);
    let playlist = store.get_playlist(&url).await.unwrap().unwrap();
    assert_eq!(playlist.strategy, SyncStrategy::All);
}

#[tokio::test]
async fn test_duplicate_url_keeps_second_title() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("First", "http://x/same"), ("Other", "http://x/o"), ("Second", "http://x/same")]));
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);

    assert_eq!(last(engine.subscribe("L", &url, SyncStrategy::All).await).await, Process::success());

    let channels = engine.channels(&url).await.unwrap();
    assert_eq!(channels.len(), 2);
    let same = channels.iter().find(|c| c.url == "http://x/same").unwrap();
    assert_eq!(same.title, "Second");
}

#[tokio::test]
async fn test_batches_bound_storage_writes() {
    let (base, upstream) = spawn_upstream().await;
    let entries: Vec<(String, String)> = (0..7)
        .map(|i| (format!("Ch {}", i), format!("http://x/{}", i)))
        .collect();
    let refs: Vec<(&str, &str)> = entries.iter().map(|(t, u)| (t.as_str(), u.as_str())).collect();
    upstream.set_m3u(&m3u(&refs));

    let (engine, store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);

    // Keep strategy: only the three batch upserts touch channel storage
    assert_eq!(last(engine.subscribe("L", &url, SyncStrategy::Keep).await).await, Process::success());

    assert_eq!(store.channel_writes(), 3);
    assert_eq!(engine.channels(&url).await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_local_refresh_is_noop() {
    let dir = std::env::temp_dir().join(format!("playlists-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("local.m3u");
    std::fs::write(&path, m3u(&[("Local", "http://x/local")])).unwrap();
    let url = path.to_string_lossy().to_string();

    let config = SyncConfig {
        local_playlist_dir: Some(dir.clone()),
        ..test_config()
    };
    let (engine, store) = engine_with(config);
    assert_eq!(last(engine.subscribe("Disk", &url, SyncStrategy::All).await).await, Process::success());
    assert_eq!(store.get_playlist(&url).await.unwrap().unwrap().source, DataSource::LocalFile);
    let before = engine.channels(&url).await.unwrap();
    let writes = store.channel_writes();
    assert_eq!(before.len(), 1);

    std::fs::write(&path, m3u(&[("Changed", "http://x/changed")])).unwrap();
    let items: Vec<Process<()>> = engine.refresh(&url, SyncStrategy::All).await.collect().await;

    assert_eq!(items, vec![Process::success()]);
    assert_eq!(engine.channels(&url).await.unwrap(), before);
    assert_eq!(store.channel_writes(), writes);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_server_files_outside_playlist_dir_are_not_read() {
    let path = std::env::temp_dir().join(format!("secret-{}.m3u", uuid::Uuid::new_v4()));
    std::fs::write(&path, m3u(&[("Secret", "http://x/secret")])).unwrap();
    let url = path.to_string_lossy().to_string();

    let (engine, store) = engine_with(test_config());
    let outcome = last(engine.subscribe("Secret", &url, SyncStrategy::All).await).await;

    assert!(matches!(outcome, Process::Failure { .. }));
    assert_eq!(store.get_playlist(&url).await.unwrap().unwrap().source, DataSource::M3u);
    assert!(engine.channels(&url).await.unwrap().is_empty());

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_share_one_run() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a"), ("B", "http://x/b")]));
    *upstream.tail.lock().unwrap() = "#EXTINF:-1,C\nhttp://x/c\n".to_string();
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/slow.m3u", base);

    let first = engine.subscribe("Slow", &url, SyncStrategy::All).await;
    assert!(engine.registry().is_running(&url));
    let second = engine.refresh(&url, SyncStrategy::All).await;

    upstream.release.notify_one();

    let (a, b) = tokio::join!(last(first), last(second));
    assert_eq!(a, Process::success());
    assert_eq!(b, Process::success());
    assert_eq!(upstream.hits(), 1);
    assert_eq!(engine.channels(&url).await.unwrap().len(), 3);
    assert!(!engine.registry().is_running(&url));
}

#[tokio::test]
async fn test_cancel_keeps_partial_progress() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a"), ("B", "http://x/b"), ("C", "http://x/c")]));
    *upstream.tail.lock().unwrap() = m3u(&[("D", "http://x/d")]);

    let config = SyncConfig {
        batch_size: 2,
        ..test_config()
    };
    let (engine, store) = engine_with(config);
    let url = format!("{}/slow.m3u", base);
    store.upsert_channel(&Channel::new(&url, "http://x/stale", "Stale", "")).await.unwrap();

    let mut progress = engine.subscribe("Slow", &url, SyncStrategy::All).await;
    loop {
        match progress.next().await {
            Some(Process::Loading { committed }) if committed >= 2 => break,
            Some(Process::Loading { .. }) => continue,
            other => panic!("unexpected progress: {:?}", other),
        }
    }

    // Let the pipeline drain the buffered third entry
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(engine.cancel(&url));

    let rest: Vec<Process<()>> = progress.collect().await;
    assert_eq!(rest.last(), Some(&Process::<()>::failure("sync cancelled")));

    let urls = url_set(&engine.channels(&url).await.unwrap());
    assert!(urls.contains("http://x/stale"), "no stale delete after cancellation");
    assert!(urls.contains("http://x/c"), "unflushed batch is written on cancellation");
    assert!(!urls.contains("http://x/d"));
    assert!(!engine.cancel(&url));
}

#[tokio::test]
async fn test_read_timeout_fails_and_keeps_partial_progress() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a")]));
    let config = SyncConfig {
        read_line_timeout: Duration::from_millis(200),
        ..test_config()
    };
    let (engine, _store) = engine_with(config);
    let url = format!("{}/slow.m3u", base);

    let outcome = last(engine.subscribe("Slow", &url, SyncStrategy::All).await).await;

    assert!(failure_message(outcome).contains("timed out"));
    assert_eq!(engine.channels(&url).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_timeout_mid_body_is_a_timeout() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a")]));
    let config = SyncConfig {
        fetch_timeout: Duration::from_millis(300),
        ..test_config()
    };
    let (engine, _store) = engine_with(config);
    let url = format!("{}/slow.m3u", base);

    let message = failure_message(last(engine.subscribe("Slow", &url, SyncStrategy::All).await).await);

    assert!(message.starts_with("timed out"), "unexpected failure: {}", message);
    assert_eq!(engine.channels(&url).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_broken_upstream_skips_stale_delete() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a"), ("B", "http://x/b")]));
    let (engine, store) = engine_with(test_config());
    let url = format!("{}/broken.m3u", base);
    store.upsert_channel(&Channel::new(&url, "http://x/stale", "Stale", "")).await.unwrap();

    let outcome = last(engine.subscribe("Broken", &url, SyncStrategy::All).await).await;
    assert!(matches!(outcome, Process::Failure { .. }));

    let urls = url_set(&engine.channels(&url).await.unwrap());
    assert_eq!(urls.len(), 3);
    assert!(urls.contains("http://x/stale"));

    let playlist = store.get_playlist(&url).await.unwrap().unwrap();
    assert!(playlist.synced_at.is_none());
}

#[tokio::test]
async fn test_http_error_is_failure() {
    let (base, _upstream) = spawn_upstream().await;
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/missing.m3u", base);

    let outcome = last(engine.subscribe("Missing", &url, SyncStrategy::All).await).await;
    assert!(failure_message(outcome).contains("404"));
}

#[tokio::test]
async fn test_strict_mode_aborts_on_invalid_url() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("Good", "http://x/good"), ("Bad", "x/bad.m3u8"), ("Late", "http://x/late")]));
    let config = SyncConfig {
        parse_mode: ParseMode::Strict,
        batch_size: 1,
        ..test_config()
    };
    let (engine, _store) = engine_with(config);
    let url = format!("{}/list.m3u", base);

    let outcome = last(engine.subscribe("Strict", &url, SyncStrategy::All).await).await;
    assert!(failure_message(outcome).contains("no recognizable scheme"));

    let urls = url_set(&engine.channels(&url).await.unwrap());
    assert_eq!(urls, ["http://x/good".to_string()].into_iter().collect());
}

#[tokio::test]
async fn test_lenient_mode_drops_invalid_url() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("Good", "http://x/good"), ("Bad", "x/bad.m3u8"), ("Late", "http://x/late")]));
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);

    assert_eq!(last(engine.subscribe("Lenient", &url, SyncStrategy::All).await).await, Process::success());
    assert_eq!(engine.channels(&url).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_storage_failure_aborts_remaining_batches() {
    let (base, upstream) = spawn_upstream().await;
    let entries: Vec<(String, String)> = (0..5)
        .map(|i| (format!("Ch {}", i), format!("http://x/{}", i)))
        .collect();
    let refs: Vec<(&str, &str)> = entries.iter().map(|(t, u)| (t.as_str(), u.as_str())).collect();
    upstream.set_m3u(&m3u(&refs));

    let config = SyncConfig {
        batch_size: 2,
        ..test_config()
    };
    let (engine, store) = engine_with(config);
    store.fail_channel_writes_after(1);
    let url = format!("{}/list.m3u", base);

    let outcome = last(engine.subscribe("L", &url, SyncStrategy::All).await).await;

    assert!(failure_message(outcome).contains("storage error"));
    assert_eq!(engine.channels(&url).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_xtream_subscription() {
    let (base, upstream) = spawn_upstream().await;
    let (engine, store) = engine_with(test_config());
    let url = format!("{}/get.php?username=u&password=p&type=m3u_plus", base);

    let outcome = last(engine.subscribe("Xtream", &url, SyncStrategy::All).await).await;
    assert_eq!(outcome, Process::success());

    let playlist = store.get_playlist(&url).await.unwrap().unwrap();
    assert_eq!(playlist.source, DataSource::Xtream);

    let channels = engine.channels(&url).await.unwrap();
    let urls: Vec<String> = channels.iter().map(|c| c.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/live/u/p/1.ts", base),
            format!("{}/movie/u/p/7.mkv", base),
            format!("{}/series/u/p/3.mp4", base),
        ]
    );

    assert_eq!(channels[0].category, "News");
    assert_eq!(channels[0].relation_id.as_deref(), Some("cnn.us"));
    assert_eq!(channels[1].category, "Movies");
    assert_eq!(channels[2].category, "");
    assert_eq!(channels[2].cover.as_deref(), Some("http://x/dark.jpg"));

    // auth, then categories and streams for each kind
    assert_eq!(upstream.hits(), 7);
}

#[tokio::test]
async fn test_xtream_inactive_account_fails() {
    let (base, _upstream) = spawn_upstream().await;
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/player_api.php?username=u&password=wrong", base);

    let outcome = last(engine.subscribe("Xtream", &url, SyncStrategy::All).await).await;
    assert!(failure_message(outcome).contains("not active"));
}

#[tokio::test]
async fn test_unsubscribe_cascades() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a")]));
    let (engine, store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);
    last(engine.subscribe("L", &url, SyncStrategy::All).await).await;

    let removed = engine.unsubscribe(&url).await.unwrap().unwrap();
    assert_eq!(removed.url, url);
    assert!(store.channels_by_playlist(&url).await.unwrap().is_empty());
    assert!(engine.unsubscribe(&url).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unsubscribe_cancels_in_flight_run() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a")]));
    let (engine, store) = engine_with(test_config());
    let url = format!("{}/slow.m3u", base);

    let progress = engine.subscribe("Slow", &url, SyncStrategy::All).await;
    let removed = engine.unsubscribe(&url).await.unwrap();

    assert!(removed.is_some());
    assert!(matches!(last(progress).await, Process::Failure { .. }));
    assert!(store.channels_by_playlist(&url).await.unwrap().is_empty());
    assert!(!engine.registry().is_running(&url));
}

#[tokio::test]
async fn test_refresh_unknown_playlist_fails() {
    let (engine, _store) = engine_with(test_config());
    let outcome = last(engine.refresh("http://nowhere/list.m3u", SyncStrategy::All).await).await;
    assert!(failure_message(outcome).contains("not found"));
}

#[tokio::test]
async fn test_epg_links() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a")]));
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);
    last(engine.subscribe("L", &url, SyncStrategy::All).await).await;

    let epg = engine.subscribe_epg("Guide", "http://x/epg.xml").await.unwrap();
    assert_eq!(epg.source, DataSource::Epg);
    assert_eq!(last(engine.refresh("http://x/epg.xml", SyncStrategy::All).await).await, Process::success());

    engine.link_epg(&url, "http://x/epg.xml").await.unwrap();
    let linked = engine.link_epg(&url, "http://x/epg.xml").await.unwrap();
    assert_eq!(linked.epg_urls, vec!["http://x/epg.xml".to_string()]);

    let unlinked = engine.unlink_epg(&url, "http://x/epg.xml").await.unwrap();
    assert!(unlinked.epg_urls.is_empty());

    assert!(matches!(
        engine.link_epg("http://nowhere", "http://x/epg.xml").await,
        Err(SyncError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_update_unknown_channel() {
    let (engine, _store) = engine_with(test_config());
    let result = engine.update_channel("missing", &ChannelPatch::default()).await;
    assert!(matches!(result, Err(SyncError::NotFound(_))));
}

#[tokio::test]
async fn test_refresh_all_skips_local_and_epg() {
    let (base, upstream) = spawn_upstream().await;
    upstream.set_m3u(&m3u(&[("A", "http://x/a")]));
    let (engine, _store) = engine_with(test_config());
    let url = format!("{}/list.m3u", base);
    last(engine.subscribe("L", &url, SyncStrategy::All).await).await;
    engine.subscribe_epg("Guide", "http://x/epg.xml").await.unwrap();
    last(engine.subscribe("Gone", &format!("{}/missing.m3u", base), SyncStrategy::All).await).await;

    let (succeeded, failed) = engine.refresh_all().await.unwrap();
    assert_eq!((succeeded, failed), (1, 1));
}
