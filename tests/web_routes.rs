use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use notas::{batch::NotificationOutcome, web};
use tower::ServiceExt;


use notas_support::{RecordingTransport, app_with, spreadsheet};

fn router(transport: Arc<RecordingTransport>) -> (Router, Arc<notas::App>) {
    let app = Arc::new(app_with(spreadsheet(), transport));
    (web::router(app.clone()), app)
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn link_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn notify_request(credentials: Option<&str>, body: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri("/admin/notify")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(credentials) = credentials {
        request = request.header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode(credentials)),
        );
    }
    request.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn index_shows_the_form() {
    let (router, _) = router(Arc::new(RecordingTransport::new()));

    let response = router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains("<title>Algoritmos II - Consulta de Notas</title>"));
    assert!(html.contains("name=\"padron\""));
}

#[tokio::test]
async fn known_pair_gets_a_link_by_mail() {
    let transport = Arc::new(RecordingTransport::new());
    let (router, _) = router(transport.clone());

    let response = router
        .oneshot(link_request("padron=+942039+&email=FOO%40bar.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("foo@bar.com"));

    let deliveries = transport.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].recipients, vec!["foo@bar.com".to_string()]);
    assert_eq!(deliveries[0].subject(), Some("Enlace para consultar las notas"));
}

#[tokio::test]
async fn unknown_pair_is_flashed() {
    let transport = Arc::new(RecordingTransport::new());
    let (router, _) = router(transport.clone());

    let response = router
        .oneshot(link_request("padron=942039&email=otro%40bar.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains("La dirección de mail no está asociada a ese padrón"));
    assert!(html.contains("value=\"otro@bar.com\""));
    assert!(transport.deliveries().is_empty());
}

#[tokio::test]
async fn invalid_form_is_rerendered_with_the_reason() {
    let transport = Arc::new(RecordingTransport::new());
    let (router, _) = router(transport.clone());

    let response = router
        .oneshot(link_request("padron=94-20&email=foo%40bar.com"))
        .await
        .unwrap();

    assert!(text(response).await.contains("Ingrese un padrón válido"));
    assert!(transport.deliveries().is_empty());
}

#[tokio::test]
async fn mail_failure_shows_the_error_page() {
    let transport = Arc::new(RecordingTransport::new().rejecting("foo@bar.com"));
    let (router, _) = router(transport);

    let response = router
        .oneshot(link_request("padron=942039&email=foo%40bar.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(text(response).await.contains("No se pudo enviar el mail"));
}

#[tokio::test]
async fn signed_key_shows_the_grades() {
    let (router, app) = router(Arc::new(RecordingTransport::new()));
    let key = app.signer.sign("942039");

    let response = router
        .oneshot(get(&format!("/consultar?clave={key}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = text(response).await;
    assert!(html.contains("<th>TP1</th><td>8</td>"));
    assert!(html.contains("<th>Parcial</th><td>7</td>"));
    assert!(!html.contains("_internal"));
}

#[tokio::test]
async fn bad_or_missing_key_is_unprocessable() {
    for uri in ["/consultar?clave=garbage", "/consultar"] {
        let (router, _) = router(Arc::new(RecordingTransport::new()));

        let response = router.oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(text(response).await.contains("Clave no válida"));
    }
}

#[tokio::test]
async fn key_for_unknown_student_shows_not_found() {
    let (router, app) = router(Arc::new(RecordingTransport::new()));
    let key = app.signer.sign("555");

    let response = router
        .oneshot(get(&format!("/consultar?clave={key}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(text(response).await.contains("Padrón 555 no encontrado"));
}

#[tokio::test]
async fn batch_trigger_requires_basic_auth() {
    for credentials in [None, Some("admin:wrong")] {
        let transport = Arc::new(RecordingTransport::new());
        let (router, _) = router(transport.clone());

        let response = router
            .oneshot(notify_request(credentials, r#"{"assignment": "tp1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Login required\""
        );
        assert_eq!(text(response).await, "No se pudo verificar el login!");
        assert!(transport.deliveries().is_empty());
    }
}

#[tokio::test]
async fn batch_trigger_streams_outcomes() {
    let transport = Arc::new(RecordingTransport::new());
    let (router, _) = router(transport.clone());

    let response = router
        .oneshot(notify_request(Some("admin:hunter2"), r#"{"assignment": "tp1"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-ndjson");

    let body = text(response).await;
    let outcomes: Vec<NotificationOutcome> = body
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let groups: Vec<&str> = outcomes.iter().map(|o| o.group.as_str()).collect();
    assert_eq!(groups, vec!["1", "4"]);
    assert!(outcomes.iter().all(|o| o.sent));
    assert_eq!(transport.deliveries().len(), 2);
}

#[tokio::test]
async fn batch_that_cannot_start_ends_with_an_error_line() {
    let (router, _) = router(Arc::new(RecordingTransport::new()));

    let response = router
        .oneshot(notify_request(Some("admin:hunter2"), r#"{"assignment": "parcial"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = text(response).await;
    let last: serde_json::Value = serde_json::from_str(body.lines().last().unwrap()).unwrap();
    assert!(last["error"].as_str().unwrap().contains("notasParcial"));
}

#[tokio::test]
async fn batch_trigger_rejects_bad_json() {
    let (router, _) = router(Arc::new(RecordingTransport::new()));

    let response = router
        .oneshot(notify_request(Some("admin:hunter2"), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
