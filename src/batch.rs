#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::Tabled;
use typed_builder::TypedBuilder;

use crate::{
    notifier::{ASSIGNMENT_TEMPLATE, Notifier},
    store::{Group, GroupNotificationStore, StoreError},
};

/// What happened to one group during a notification batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NotificationOutcome {
    /// Group number.
    pub group:     String,
    /// Addresses the e-mail was sent to.
    pub emails:    Vec<String>,
    /// When the group was processed.
    #[builder(default = Utc::now())]
    pub timestamp: DateTime<Utc>,
    /// Whether the e-mail left.
    pub sent:      bool,
    /// Why the group failed, if it did.
    #[builder(default, setter(strip_option))]
    pub error:     Option<String>,
}

/// Row shown in the terminal summary.
#[derive(Tabled)]
pub struct OutcomeRow {
    #[tabled(rename = "Grupo")]
    /// Group number.
    group:  String,
    #[tabled(rename = "Emails")]
    /// Comma-separated addresses.
    emails: String,
    #[tabled(rename = "Enviado")]
    /// `sí` or `no`.
    sent:   String,
    #[tabled(rename = "Error")]
    /// Error text or blank.
    error:  String,
}

impl From<&NotificationOutcome> for OutcomeRow {
    fn from(outcome: &NotificationOutcome) -> Self {
        Self {
            group:  outcome.group.clone(),
            emails: outcome.emails.join(", "),
            sent:   if outcome.sent { "sí" } else { "no" }.to_string(),
            error:  outcome.error.clone().unwrap_or_default(),
        }
    }
}

/// Totals of a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Groups processed.
    pub processed: usize,
    /// Groups whose e-mail left and were marked.
    pub sent:      usize,
    /// Groups with any error.
    pub failed:    usize,
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} groups processed, {} notified, {} failed",
            self.processed, self.sent, self.failed
        )
    }
}

/// Subject of the feedback e-mail for `group`.
pub fn assignment_subject(assignment: &str, group: &Group) -> String {
    format!("Correccion de notas ejercicio {assignment} - Grupo {}", group.number)
}

/// E-mails every pending group of `assignment` and marks it notified.
///
/// Pending groups are read once; failing to read them aborts the batch
/// before anything is sent. After that, a failure only affects its own group:
/// it is recorded in that group's outcome and the batch moves on. A group
/// whose e-mail left but whose marker could not be written is reported with
/// `sent: true` and an error, since it will be picked up again next run.
///
/// `on_outcome` sees every outcome as soon as it is known.
pub fn notify_assignment<F>(
    store: &GroupNotificationStore,
    notifier: &Notifier,
    course: &str,
    assignment: &str,
    mut on_outcome: F,
) -> Result<BatchSummary, StoreError>
where
    F: FnMut(&NotificationOutcome),
{
    let groups = store.pending_groups(assignment)?;
    tracing::info!("Notifying {} groups for `{assignment}`", groups.len());

    let mut summary = BatchSummary::default();
    for group in groups {
        let outcome = notify_group(store, notifier, course, assignment, &group);

        summary.processed += 1;
        if outcome.error.is_some() {
            summary.failed += 1;
            tracing::warn!(
                "Group {}: {}",
                outcome.group,
                outcome.error.as_deref().unwrap_or_default()
            );
        } else {
            summary.sent += 1;
        }
        on_outcome(&outcome);
    }

    tracing::info!("Batch for `{assignment}` done: {summary}");
    Ok(summary)
}

/// Sends one group's feedback and writes its marker.
fn notify_group(
    store: &GroupNotificationStore,
    notifier: &Notifier,
    course: &str,
    assignment: &str,
    group: &Group,
) -> NotificationOutcome {
    let variables = json!({
        "curso": course,
        "ejercicio": assignment,
        "grupo": group.number,
        "corrector": group.corrector,
        "nota": group.grade,
        "correcciones": group.feedback,
    });
    let outcome = NotificationOutcome::builder()
        .group(group.number.clone())
        .emails(group.emails.clone());

    if let Err(err) = notifier.send(
        ASSIGNMENT_TEMPLATE,
        &assignment_subject(assignment, group),
        &group.emails,
        &variables,
    ) {
        return outcome.sent(false).error(err.to_string()).build();
    }

    match store.mark_notified(group) {
        Ok(()) => outcome.sent(true).build(),
        Err(err) => outcome
            .sent(true)
            .error(format!("Sent, but could not mark as notified: {err}"))
            .build(),
    }
}
