use std::time::Duration;

use serde_json::{json, Value};
use snipt_core::config::GitlabConfig;
use snipt_core::gitlab::{GitlabAdapter, GITLAB_INTERNAL, GITLAB_PRIVATE, GITLAB_PUBLIC};
use snipt_core::{PlatformAdapter, Project, Snippet, SnippetFile};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API: &str = "/api/v4";

async fn authenticated(server: &MockServer) -> GitlabAdapter {
    Mock::given(method("GET"))
        .and(path(format!("{API}/user")))
        .and(header("private-token", "glpat-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "dev" })))
        .mount(server)
        .await;

    let mut adapter = GitlabAdapter::new(
        &GitlabConfig {
            url: format!("{}{API}", server.uri()),
            access_token: "glpat-test".into(),
            ..Default::default()
        },
        Duration::from_secs(5),
    )
    .unwrap();
    adapter.init().await.unwrap();
    adapter
}

fn label(server: &MockServer) -> String {
    format!("127.0.0.1:{}:dev", server.address().port())
}

fn single(id: u64, visibility: &str, file_name: &str) -> Value {
    json!({
        "id": id,
        "title": format!("snippet {id}"),
        "description": "",
        "visibility": visibility,
        "web_url": format!("https://gitlab.example.com/-/snippets/{id}"),
        "raw_url": format!("https://gitlab.example.com/-/snippets/{id}/raw"),
        "file_name": file_name,
        "files": [{ "path": file_name, "raw_url": format!("https://gitlab.example.com/-/snippets/{id}/raw/main/{file_name}") }],
    })
}

fn multi(id: u64, visibility: &str, paths: &[&str]) -> Value {
    let files: Vec<Value> = paths
        .iter()
        .map(|p| json!({ "path": p, "raw_url": format!("https://gitlab.example.com/-/snippets/{id}/raw/main/{p}") }))
        .collect();
    json!({
        "id": id,
        "title": format!("snippet {id}"),
        "visibility": visibility,
        "web_url": format!("https://gitlab.example.com/-/snippets/{id}"),
        "file_name": paths[0],
        "files": files,
    })
}

#[tokio::test]
async fn init_uses_username_in_label() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;
    assert_eq!(adapter.platform_label(), label(&server));
    assert_eq!(adapter.filter_key(), label(&server));
}

#[tokio::test]
async fn list_follows_next_page_header_and_filters_non_public() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{API}/snippets")))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "50"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-next-page", "2")
                .set_body_json(vec![single(3, "public", "a.sh"), single(1, "private", "b.sh")]),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/snippets")))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-next-page", "")
                .set_body_json(vec![single(2, "internal", "c.sh")]),
        )
        .mount(&server)
        .await;

    let public = adapter.list(false, false).await.unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].id, "3");
    assert_eq!(public[0].platform, label(&server));

    let all = adapter.list(false, true).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    let visibilities: Vec<&str> = all.iter().map(|e| e.visibility.as_str()).collect();
    assert_eq!(visibilities, vec!["private", "internal", "public"]);
}

#[tokio::test]
async fn list_expansion_branches_on_file_count() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{API}/snippets")))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            single(5, "public", "only.py"),
            multi(6, "public", &["x.rs", "y.rs"]),
        ]))
        .mount(&server)
        .await;

    let entries = adapter.list(true, false).await.unwrap();
    let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://gitlab.example.com/-/snippets/5/only.py",
            "https://gitlab.example.com/-/snippets/6/x.rs",
            "https://gitlab.example.com/-/snippets/6/y.rs",
        ]
    );
    assert_eq!(
        entries[0].raw_url.as_deref(),
        Some("https://gitlab.example.com/-/snippets/5/raw")
    );

    let again = adapter.list(true, false).await.unwrap();
    let again_urls: Vec<&str> = again.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(again_urls, urls);
}

#[tokio::test]
async fn get_single_file_reads_the_raw_endpoint() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{API}/snippets/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(single(5, "internal", "only.py")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/snippets/5/raw")))
        .respond_with(ResponseTemplate::new(200).set_body_string("print('hi')"))
        .expect(1)
        .mount(&server)
        .await;

    let snippet = adapter.get("5").await.unwrap();
    assert_eq!(snippet.visibility, Some(GITLAB_INTERNAL));
    assert_eq!(snippet.files.len(), 1);
    assert_eq!(snippet.files[0].path, "only.py");
    assert_eq!(snippet.files[0].contents, b"print('hi')");
    assert_eq!(
        snippet.files[0].filter,
        "https://gitlab.example.com/-/snippets/5/only.py"
    );
}

#[tokio::test]
async fn get_multi_file_fetches_each_file_by_path() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{API}/snippets/6")))
        .respond_with(ResponseTemplate::new(200).set_body_json(multi(6, "private", &["x.rs", "y.rs"])))
        .mount(&server)
        .await;
    for (file, body) in [("x.rs", "fn x() {}"), ("y.rs", "fn y() {}")] {
        Mock::given(method("GET"))
            .and(path(format!("{API}/snippets/6/files/main/{file}/raw")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let snippet = adapter.get("6").await.unwrap();
    assert_eq!(snippet.visibility, Some(GITLAB_PRIVATE));
    let contents: Vec<&[u8]> = snippet.files.iter().map(|f| f.contents.as_slice()).collect();
    assert_eq!(contents, vec![b"fn x() {}".as_slice(), b"fn y() {}".as_slice()]);
}

#[tokio::test]
async fn create_defaults_to_private_and_update_omits_unset_visibility() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{API}/snippets")))
        .and(body_partial_json(json!({
            "title": "fresh",
            "visibility": "private",
            "file_name": "run.sh",
            "content": "echo run",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(single(9, "private", "run.sh")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{API}/snippets/9")))
        .and(body_partial_json(json!({
            "files": [
                { "action": "update", "file_path": "run.sh", "content": "echo run" },
                { "action": "update", "file_path": "lib.sh", "content": "true" },
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(single(9, "private", "run.sh")))
        .expect(1)
        .mount(&server)
        .await;

    let mut snippet = Snippet {
        title: "fresh".into(),
        files: vec![SnippetFile::new("run.sh", "echo run")],
        ..Default::default()
    };
    let handle = adapter.create(&snippet).await.unwrap();
    assert_eq!(handle.id, "9");
    assert_eq!(handle.url, "https://gitlab.example.com/-/snippets/9");

    snippet.files.push(SnippetFile::new("lib.sh", "true"));
    adapter.update(&handle.id, &snippet).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    let body: Value = serde_json::from_slice(&put.body).unwrap();
    assert!(body.get("visibility").is_none());
}

#[tokio::test]
async fn non_numeric_ids_are_rejected_before_any_request() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;
    let err = adapter.delete("not-a-number").await.unwrap_err();
    assert!(matches!(err, snipt_core::AdapterError::InvalidId { .. }));
}

#[tokio::test]
async fn project_list_keeps_projects_with_snippets_enabled() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("{API}/projects")))
        .and(query_param("membership", "true"))
        .and(query_param("archived", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "path_with_namespace": "team/on", "snippets_enabled": true },
            { "id": 2, "path_with_namespace": "team/off", "snippets_enabled": false },
            { "id": 3, "path_with_namespace": "team/level", "snippets_access_level": "enabled" },
            { "id": 4, "path_with_namespace": "team/disabled", "snippets_access_level": "disabled" },
        ])))
        .mount(&server)
        .await;

    let capability = adapter.project_capability().unwrap();
    let projects = capability.project_list().await.unwrap();
    assert_eq!(
        projects,
        vec![
            Project {
                id: 1,
                path_with_namespace: "team/on".into()
            },
            Project {
                id: 3,
                path_with_namespace: "team/level".into()
            },
        ]
    );
}

#[tokio::test]
async fn scoped_adapter_targets_project_endpoints() {
    let server = MockServer::start().await;
    let adapter = authenticated(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{API}/projects/42/snippets")))
        .respond_with(ResponseTemplate::new(201).set_body_json(single(77, "private", "p.txt")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/projects/42/snippets")))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![single(77, "public", "p.txt")]))
        .expect(1)
        .mount(&server)
        .await;

    let scoped = adapter
        .project_capability()
        .unwrap()
        .scoped_to(&Project {
            id: 42,
            path_with_namespace: "team/tools".into(),
        });
    assert_eq!(scoped.platform_label(), format!("{} /team/tools", label(&server)));
    assert_eq!(scoped.visibility_options(), vec![GITLAB_PRIVATE, GITLAB_PUBLIC, GITLAB_INTERNAL]);

    let handle = scoped
        .create(&Snippet {
            title: "proj".into(),
            files: vec![SnippetFile::new("p.txt", "p")],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(handle.url, "https://gitlab.example.com/-/snippets/77");

    let listed = scoped.list(false, false).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].platform, scoped.platform_label());
}
