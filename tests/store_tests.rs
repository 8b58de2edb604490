use std::sync::Arc;

use notas::{
    sheets::{Dimension, ValueRange},
    store::{GradeStore, GroupNotificationStore, RosterStore, StoreError},
};


use notas_support::{FakeSheets, config, group_emails_block, spreadsheet};

fn roster(sheets: FakeSheets) -> RosterStore {
    RosterStore::new(Arc::new(sheets), &config())
}

fn grades(sheets: FakeSheets) -> GradeStore {
    GradeStore::new(Arc::new(sheets), &config())
}

#[test]
fn roster_matches_id_and_email_case_insensitively() {
    let store = roster(spreadsheet());

    assert!(store.verify("942039", "foo@bar.com").unwrap());
    assert!(store.verify("942039", "FOO@BAR.COM").unwrap());
    assert!(store.verify("AB123", "dani@x.com").unwrap());
}

#[test]
fn roster_rejects_mismatched_pairs() {
    let store = roster(spreadsheet());

    assert!(!store.verify("942039", "other@bar.com").unwrap());
    assert!(!store.verify("100001", "foo@bar.com").unwrap());
    assert!(!store.verify("999999", "foo@bar.com").unwrap());
}

#[test]
fn roster_rows_without_email_never_match() {
    let store = roster(spreadsheet());

    assert!(!store.verify("100000", "").unwrap());
    assert!(!store.verify("100001", "").unwrap());
}

#[test]
fn empty_roster_verifies_nobody() {
    let empty = ValueRange::new("Listado!A1:A1", Dimension::Rows, Vec::<Vec<&str>>::new());
    let store = roster(FakeSheets::new().with_range("Listado", empty));

    assert!(!store.verify("942039", "foo@bar.com").unwrap());
}

#[test]
fn missing_roster_sheet_is_an_error() {
    let store = roster(FakeSheets::new());

    assert!(matches!(
        store.verify("942039", "foo@bar.com"),
        Err(StoreError::RangeNotFound(_))
    ));
}

#[test]
fn grades_hide_comment_columns() {
    let store = grades(spreadsheet());

    let fields = store.grades("942039").unwrap();
    assert_eq!(
        fields,
        vec![
            ("Padrón".to_string(), "942039".to_string()),
            ("TP1".to_string(), "8".to_string()),
            ("Parcial".to_string(), "7".to_string()),
        ]
    );
    assert_eq!(store.grades("942039").unwrap(), fields);
}

#[test]
fn grades_pad_short_rows() {
    let store = grades(spreadsheet());

    let fields = store.grades("100001").unwrap();
    assert_eq!(fields.last(), Some(&("Parcial".to_string(), String::new())));
}

#[test]
fn grades_of_unknown_student_are_not_found() {
    let store = grades(spreadsheet());

    let err = store.grades("555").unwrap_err();
    assert!(matches!(&err, StoreError::NotFound(id) if id == "555"));
    assert_eq!(err.to_string(), "Padrón 555 no encontrado");
}

#[test]
fn grades_without_id_column_report_it() {
    let block = ValueRange::new(
        "'Notas APP'!A1:B2",
        Dimension::Rows,
        vec![vec!["Legajo", "TP1"], vec!["942039", "8"]],
    );
    let store = grades(FakeSheets::new().with_range("'Notas APP'", block));

    assert!(matches!(
        store.grades("942039"),
        Err(StoreError::MissingColumn { column, .. }) if column == "Padrón"
    ));
}

#[test]
fn pending_groups_skip_notified_and_emailless_rows() {
    let store = GroupNotificationStore::new(Arc::new(spreadsheet()), &config());

    let groups = store.pending_groups("tp1").unwrap();
    let numbers: Vec<&str> = groups.iter().map(|g| g.number.as_str()).collect();
    assert_eq!(numbers, vec!["1", "4"]);

    let first = &groups[0];
    assert_eq!(first.emails, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
    assert_eq!(first.corrector, "Ana");
    assert_eq!(first.grade, "8");
    assert_eq!(first.feedback, "Bien");
    assert_eq!(first.notified_cell.to_a1(), "Grupos!I2");
    assert_eq!(groups[1].notified_cell.to_a1(), "Grupos!I5");
}

#[test]
fn unknown_assignment_reports_its_range_key() {
    let store = GroupNotificationStore::new(Arc::new(spreadsheet()), &config());

    assert!(matches!(
        store.pending_groups("segundo parcial"),
        Err(StoreError::RangeNotFound(key)) if key == "notasSegundoParcial"
    ));
    assert!(matches!(
        store.pending_groups("   "),
        Err(StoreError::RangeNotFound(key)) if key == "notas"
    ));
}

#[test]
fn assignment_block_without_notified_column_is_rejected() {
    let block = ValueRange::new(
        "Grupos!F1:H3",
        Dimension::Columns,
        vec![
            vec!["Nota", "8", "6"],
            vec!["Corrector", "Ana", "Beto"],
            vec!["Correcciones", "Bien", "Regular"],
        ],
    );
    let sheets = FakeSheets::new()
        .with_range("emailsGrupos", group_emails_block())
        .with_range("notasTp1", block);
    let store = GroupNotificationStore::new(Arc::new(sheets), &config());

    assert!(matches!(
        store.pending_groups("tp1"),
        Err(StoreError::MissingColumn { column, .. }) if column == "Notificado"
    ));
}

#[test]
fn marking_writes_the_marker_into_the_group_cell() {
    let sheets = Arc::new(spreadsheet());
    let store = GroupNotificationStore::new(sheets.clone(), &config());

    let groups = store.pending_groups("tp1").unwrap();
    store.mark_notified(&groups[1]).unwrap();

    assert_eq!(sheets.updates(), vec![("Grupos!I5".to_string(), "TRUE".to_string())]);
}

#[test]
fn missing_group_emails_range_is_named() {
    let sheets = FakeSheets::new().with_range("notasTp1", notas_support::tp1_block());
    let store = GroupNotificationStore::new(Arc::new(sheets), &config());

    let err = store.pending_groups("tp1").unwrap_err();
    assert!(matches!(&err, StoreError::RangeNotFound(range) if range == "emailsGrupos"));
    assert_eq!(err.to_string(), "No range named `emailsGrupos` exists in the spreadsheet");
}

#[test]
fn same_header_in_both_blocks_resolves_to_its_own_block() {
    let emails = ValueRange::new(
        "Grupos!A1:C3",
        Dimension::Columns,
        vec![
            vec!["Grupo", "1", "2"],
            vec!["Emails", "a@x.com", "b@x.com"],
            vec!["Notificado", "viejo", "viejo"],
        ],
    );
    let assignment = ValueRange::new(
        "Grupos!F1:I3",
        Dimension::Columns,
        vec![
            vec!["Nota", "8", "6"],
            vec!["Corrector", "Ana", "Beto"],
            vec!["Correcciones", "Bien", "Regular"],
            vec!["Notificado", "", "TRUE"],
        ],
    );
    let sheets = FakeSheets::new()
        .with_range("emailsGrupos", emails)
        .with_range("notasTp1", assignment);
    let store = GroupNotificationStore::new(Arc::new(sheets), &config());

    let groups = store.pending_groups("tp1").unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].number, "1");
    assert_eq!(groups[0].notified, "");
    assert_eq!(groups[0].notified_cell.to_a1(), "Grupos!I2");
}
