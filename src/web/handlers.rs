#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{convert::Infallible, sync::Arc};

use axum::{
    Form,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use futures::{StreamExt, channel::mpsc};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{admin, forms::LinkRequest};
use crate::{
    app::App,
    batch,
    notifier::{NotifyError, SIGNIN_SUBJECT, SIGNIN_TEMPLATE},
    store::StoreError,
};

/// Flash shown when the padrón and e-mail do not belong together.
pub const UNKNOWN_PAIR: &str = "La dirección de mail no está asociada a ese padrón";

/// Error page text for a missing, tampered or malformed key.
pub const INVALID_KEY: &str = "Clave no válida";

/// Error page text for anything the visitor cannot fix.
pub const INTERNAL_ERROR: &str = "Ocurrió un error inesperado, intentá de nuevo más tarde";

/// Query string of `GET /consultar`.
#[derive(Debug, Deserialize)]
pub struct ConsultQuery {
    /// Signed key from the e-mailed link.
    pub clave: Option<String>,
}

/// Body of `POST /admin/notify`.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    /// Assignment whose groups should be notified.
    pub assignment: String,
}

/// Result of handling a link request off the async runtime.
enum LinkOutcome {
    /// No roster row has that padrón and e-mail.
    Unknown,
    /// Link e-mailed.
    Sent,
    /// Roster could not be read.
    Store(StoreError),
    /// Link could not be e-mailed.
    Mail(NotifyError),
}

/// Renders a page, adding the site title.
fn render(app: &App, template: &str, status: StatusCode, mut data: Value) -> Response {
    if let Some(map) = data.as_object_mut() {
        map.insert("title".into(), app.config.app_title().into());
    }

    match app.pages.render(template, &data) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!("Could not render `{template}`: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
        }
    }
}

/// The link request form, optionally with a danger flash.
fn index_page(app: &App, form: &LinkRequest, flash: Option<&str>) -> Response {
    let messages: Vec<Value> = flash
        .map(|text| json!({"category": "danger", "text": text}))
        .into_iter()
        .collect();

    render(
        app,
        "index",
        StatusCode::OK,
        json!({"messages": messages, "padron": form.padron, "email": form.email}),
    )
}

/// Error page with `message`.
fn error_page(app: &App, status: StatusCode, message: &str) -> Response {
    render(app, "error", status, json!({ "message": message }))
}

/// Maps a store failure to a page. Unknown students are the visitor's
/// problem; everything else is logged and hidden.
fn store_error(app: &App, err: StoreError) -> Response {
    match err {
        StoreError::NotFound(_) => error_page(app, StatusCode::NOT_FOUND, &err.to_string()),
        err => {
            tracing::error!("Spreadsheet lookup failed: {err}");
            error_page(app, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}

/// Runs `f` on the blocking pool.
async fn blocking<T, F>(app: &Arc<App>, f: F) -> Result<T, Response>
where
    F: FnOnce(&App) -> T + Send + 'static,
    T: Send + 'static,
{
    let app = Arc::clone(app);
    tokio::task::spawn_blocking(move || f(&app))
        .await
        .map_err(|err| {
            tracing::error!("Blocking task failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
        })
}

/// `GET /`
pub async fn index(State(app): State<Arc<App>>) -> Response {
    index_page(&app, &LinkRequest::default(), None)
}

/// `POST /`: e-mails a consultation link when the pair is on the roster.
pub async fn request_link(State(app): State<Arc<App>>, Form(form): Form<LinkRequest>) -> Response {
    let (padron, email) = match form.validate() {
        Ok(pair) => pair,
        Err(message) => return index_page(&app, &form.normalized(), Some(message)),
    };

    let recipient = email.clone();
    let outcome = blocking(&app, move |app| match app.roster.verify(&padron, &email) {
        Ok(false) => LinkOutcome::Unknown,
        Err(err) => LinkOutcome::Store(err),
        Ok(true) => {
            let variables = json!({
                "curso": app.config.course,
                "enlace": app.consult_link(&padron),
            });
            match app
                .notifier
                .send(SIGNIN_TEMPLATE, SIGNIN_SUBJECT, &[email], &variables)
            {
                Ok(()) => LinkOutcome::Sent,
                Err(err) => LinkOutcome::Mail(err),
            }
        }
    })
    .await;

    match outcome {
        Err(response) => response,
        Ok(LinkOutcome::Sent) => {
            render(&app, "email_sent", StatusCode::OK, json!({ "email": recipient }))
        }
        Ok(LinkOutcome::Unknown) => index_page(&app, &form.normalized(), Some(UNKNOWN_PAIR)),
        Ok(LinkOutcome::Store(err)) => store_error(&app, err),
        Ok(LinkOutcome::Mail(err)) => {
            tracing::error!("Could not send link to {recipient}: {err}");
            error_page(&app, StatusCode::BAD_GATEWAY, &err.to_string())
        }
    }
}

/// `GET /consultar`: the grade table of the student named by the key.
pub async fn consult(State(app): State<Arc<App>>, Query(query): Query<ConsultQuery>) -> Response {
    let Some(padron) = query
        .clave
        .as_deref()
        .and_then(|key| app.signer.verify(key).ok())
    else {
        return error_page(&app, StatusCode::UNPROCESSABLE_ENTITY, INVALID_KEY);
    };

    match blocking(&app, move |app| app.grades.grades(&padron)).await {
        Err(response) => response,
        Ok(Ok(items)) => render(&app, "result", StatusCode::OK, json!({ "items": items })),
        Ok(Err(err)) => store_error(&app, err),
    }
}

/// `POST /admin/notify`: runs a notification batch and streams one JSON
/// outcome per line while it runs.
pub async fn notify(State(app): State<Arc<App>>, headers: HeaderMap, body: Bytes) -> Response {
    if !admin::is_admin(&headers, &app.config) {
        tracing::warn!("Rejected unauthenticated batch request");
        return admin::challenge();
    }

    let request: NotifyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("Invalid request body: {err}"))
                .into_response();
        }
    };

    let (tx, rx) = mpsc::unbounded::<String>();
    let app = Arc::clone(&app);
    tokio::task::spawn_blocking(move || {
        // A send error means the client hung up; the batch still runs to the end.
        let result = batch::notify_assignment(
            &app.groups,
            &app.notifier,
            &app.config.course,
            &request.assignment,
            |outcome| match serde_json::to_string(outcome) {
                Ok(line) => {
                    let _ = tx.unbounded_send(line + "\n");
                }
                Err(err) => tracing::error!("Could not serialize outcome: {err}"),
            },
        );

        if let Err(err) = result {
            tracing::error!("Batch for `{}` failed: {err}", request.assignment);
            let line = json!({ "error": err.to_string() }).to_string();
            let _ = tx.unbounded_send(line + "\n");
        }
    });

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(rx.map(Ok::<_, Infallible>)),
    )
        .into_response()
}
