//! HTTP scoreboard and passage provider against a local mock server.
//!
//! The clients are blocking, so each call runs on the blocking pool while
//! the runtime keeps serving the mock.

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use typesprint::config::{Difficulty, Mode};
use typesprint::passage::{HttpPassageProvider, PassageProvider};
use typesprint::scoreboard::{
    DifficultyFilter, HttpScoreboard, LeaderboardQuery, ScoreSubmission, Scoreboard,
    ScoreboardError,
};

const TIMEOUT: Duration = Duration::from_secs(2);

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

// blocking clients must be built and dropped off the async runtime
fn scoreboard(url: &str) -> HttpScoreboard {
    HttpScoreboard::new(url, TIMEOUT).unwrap()
}

fn submission() -> ScoreSubmission {
    ScoreSubmission {
        name: "ada".into(),
        wpm: 72,
        accuracy: 98,
        difficulty: Difficulty::Hard,
        mode: Mode::Test,
    }
}

fn stored(name: &str, wpm: u32) -> serde_json::Value {
    json!({
        "_id": "65f0c0ffee",
        "name": name,
        "wpm": wpm,
        "accuracy": 98,
        "difficulty": "hard",
        "mode": "test",
        "date": "2024-03-01T10:00:00.000Z",
        "__v": 0
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_posts_json_and_returns_stored_entry() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scores"))
        .and(body_json(json!({
            "name": "ada",
            "wpm": 72,
            "accuracy": 98,
            "difficulty": "hard",
            "mode": "test"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(stored("ada", 72)))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let entry = tokio::task::spawn_blocking(move || scoreboard(&uri).submit(&submission()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(entry.name, "ada");
    assert_eq!(entry.wpm, 72);
    assert_eq!(entry.difficulty, Difficulty::Hard);
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_maps_bad_request_to_missing_fields() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scores"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Missing required fields"})),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || scoreboard(&uri).submit(&submission()))
        .await
        .unwrap();
    assert_matches!(result, Err(ScoreboardError::MissingFields));
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_reports_server_error_once() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scores"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "Failed to save score"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || scoreboard(&uri).submit(&submission()))
        .await
        .unwrap();
    assert_matches!(
        result,
        Err(ScoreboardError::Status { code: 500, ref message }) if message == "Failed to save score"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn page_sends_query_parameters() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scores"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "5"))
        .and(query_param("difficulty", "hard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scores": [stored("grace", 95), stored("ada", 94)],
            "totalPages": 3,
            "currentPage": 2,
            "totalScores": 12
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = format!("{}/", server.uri());
    let query = LeaderboardQuery::new(2, 5, DifficultyFilter::Only(Difficulty::Hard));
    let page = tokio::task::spawn_blocking(move || scoreboard(&uri).page(&query))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.total_scores, 12);
    assert_eq!(page.scores[0].name, "grace");
}

#[tokio::test(flavor = "multi_thread")]
async fn page_for_all_difficulties_omits_filter() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scores"))
        .and(query_param_is_missing("difficulty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scores": [],
            "totalPages": 0,
            "currentPage": 1,
            "totalScores": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let page = tokio::task::spawn_blocking(move || {
        scoreboard(&uri).page(&LeaderboardQuery::default())
    })
    .await
    .unwrap()
    .unwrap();
    assert!(page.scores.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_scoreboard_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0");
    let Ok(listener) = listener else {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    };
    // grab a free port, then close it
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = tokio::task::spawn_blocking(move || scoreboard(&url).submit(&submission()))
        .await
        .unwrap();
    assert_matches!(result, Err(ScoreboardError::Transport(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn passage_provider_reads_json_text() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/passage"))
        .and(query_param("difficulty", "easy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"text": "\"Short words are easy to type.\"\n"})),
        )
        .mount(&server)
        .await;

    let url = format!("{}/passage", server.uri());
    let text = tokio::task::spawn_blocking(move || {
        HttpPassageProvider::new(url, TIMEOUT)
            .unwrap()
            .fetch_passage(Difficulty::Easy)
    })
    .await
    .unwrap();
    assert_eq!(text.as_deref(), Some("Short words are easy to type."));
}

#[tokio::test(flavor = "multi_thread")]
async fn passage_provider_error_object_is_none() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "quota exceeded"})),
        )
        .mount(&server)
        .await;

    let url = server.uri();
    let text = tokio::task::spawn_blocking(move || {
        HttpPassageProvider::new(url, TIMEOUT)
            .unwrap()
            .fetch_passage(Difficulty::Easy)
    })
    .await
    .unwrap();
    assert_eq!(text, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn passage_provider_rate_limited_is_none() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let url = server.uri();
    let text = tokio::task::spawn_blocking(move || {
        HttpPassageProvider::new(url, TIMEOUT)
            .unwrap()
            .fetch_passage(Difficulty::Medium)
    })
    .await
    .unwrap();
    assert_eq!(text, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn passage_provider_times_out() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let url = server.uri();
    let text = tokio::task::spawn_blocking(move || {
        HttpPassageProvider::new(url, Duration::from_millis(300))
            .unwrap()
            .fetch_passage(Difficulty::Hard)
    })
    .await
    .unwrap();
    assert_eq!(text, None);
}
